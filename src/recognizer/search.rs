//! Keyword search over transcripts.
//!
//! Whisper transcribes open dictation, so the keyword restriction happens
//! afterwards: a transcript is reduced to the first listed phrase whose words
//! appear in it, contiguous and in order. Comparison ignores case and
//! punctuation; the reported hypothesis is the phrase exactly as listed so the
//! exact command match downstream succeeds.

use crate::commands::CommandList;

#[derive(Debug, Clone, PartialEq)]
pub struct KeywordSearch {
    keywords: Vec<(String, Vec<String>)>,
}

impl KeywordSearch {
    pub fn new<'a>(phrases: impl IntoIterator<Item = &'a str>) -> Self {
        let keywords = phrases
            .into_iter()
            .map(|phrase| (phrase.to_string(), words(phrase)))
            .filter(|(_, words)| !words.is_empty())
            .collect();
        Self { keywords }
    }

    pub fn from_commands(commands: &CommandList) -> Self {
        Self::new(commands.phrases())
    }

    /// First keyword contained in `transcript`.
    pub fn spot(&self, transcript: &str) -> Option<&str> {
        let heard = words(transcript);
        self.keywords
            .iter()
            .find(|(_, keyword)| contains(&heard, keyword))
            .map(|(phrase, _)| phrase.as_str())
    }

    /// The keyword phrases joined as a decoding prompt.
    pub fn prompt(&self) -> Option<String> {
        if self.keywords.is_empty() {
            return None;
        }
        let phrases: Vec<&str> = self.keywords.iter().map(|(p, _)| p.as_str()).collect();
        Some(phrases.join(", "))
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|w| w.trim_matches('\'').to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

fn contains(heard: &[String], keyword: &[String]) -> bool {
    heard.windows(keyword.len()).any(|window| window == keyword)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spot_ignores_case_and_punctuation() {
        let search = KeywordSearch::new(["go forward", "stop"]);
        assert_eq!(search.spot(" Go forward."), Some("go forward"));
        assert_eq!(search.spot("STOP!"), Some("stop"));
    }

    #[test]
    fn test_spot_returns_listed_phrase_verbatim() {
        let search = KeywordSearch::new(["Lights On"]);
        assert_eq!(search.spot("please turn the lights on"), Some("Lights On"));
    }

    #[test]
    fn test_spot_needs_contiguous_words() {
        let search = KeywordSearch::new(["turn left"]);
        assert_eq!(search.spot("turn the car left"), None);
        assert_eq!(search.spot("left turn"), None);
        assert_eq!(search.spot("then turn left"), Some("turn left"));
    }

    #[test]
    fn test_spot_does_not_match_inside_words() {
        let search = KeywordSearch::new(["go"]);
        assert_eq!(search.spot("good morning"), None);
    }

    #[test]
    fn test_spot_prefers_list_order() {
        let search = KeywordSearch::new(["stop", "go"]);
        assert_eq!(search.spot("go and stop"), Some("stop"));
    }

    #[test]
    fn test_apostrophes_are_part_of_words() {
        let search = KeywordSearch::new(["don't stop"]);
        assert_eq!(search.spot("Don't stop."), Some("don't stop"));
        assert_eq!(search.spot("'stop'"), None);
    }

    #[test]
    fn test_empty_phrases_are_dropped() {
        let search = KeywordSearch::new(["", "  ", "..."]);
        assert!(search.is_empty());
        assert_eq!(search.spot("anything"), None);
        assert_eq!(search.prompt(), None);
    }

    #[test]
    fn test_prompt_joins_phrases() {
        let commands = CommandList::parse("go forward\n\nstop\n");
        let search = KeywordSearch::from_commands(&commands);
        assert_eq!(search.prompt(), Some("go forward, stop".to_string()));
    }

    #[test]
    fn test_silence_transcript() {
        let search = KeywordSearch::new(["stop"]);
        assert_eq!(search.spot(""), None);
        assert_eq!(search.spot("[BLANK_AUDIO]"), None);
    }
}
