//! Lifecycle of the listening screen.
//!
//! The controller owns the command list and the screen. It reacts to the
//! outcome of the one-shot setup and then to every recognizer event,
//! restarting the keyword search after each result, end of speech or timeout.

use anyhow::Result;
use log::{debug, error, info, warn};

use crate::commands::CommandList;
use crate::palette::Colour;
use crate::recognizer::{COMMANDS_SEARCH, Hypothesis, Recognizer, RecognizerEvent};
use crate::view::{Line, Screen, View};

/// Where the listener is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Listening,
    /// The last utterance matched a command.
    Matched,
    /// The recognizer reported an error or could not be restarted.
    Error,
    /// Setup failed; nothing will ever be listened to.
    Failed,
    ShutDown,
}

/// Result of a successful setup.
pub struct Initialised<R> {
    pub recognizer: R,
    pub commands: CommandList,
}

pub struct Controller<R, V> {
    recognizer: Option<R>,
    view: V,
    commands: CommandList,
    screen: Screen,
    phase: Phase,
}

impl<R: Recognizer, V: View> Controller<R, V> {
    pub fn new(view: V) -> Self {
        let mut controller = Self {
            recognizer: None,
            view,
            commands: CommandList::default(),
            screen: Screen {
                prompt: Line::new("Initialising...", Colour::Black),
                output: Line::default(),
            },
            phase: Phase::Initializing,
        };
        controller.render();
        controller
    }

    /// Applies the outcome of the setup task.
    pub fn on_initialised(&mut self, outcome: Result<Initialised<R>>) {
        match outcome {
            Ok(Initialised {
                recognizer,
                commands,
            }) => {
                info!("Listening for {} commands", commands.len());
                self.recognizer = Some(recognizer);
                self.commands = commands;
                self.screen.prompt = Line::new("PLEASE", Colour::Red);
                self.screen.output = Line::new("SPEAK...", Colour::Red);
                self.phase = Phase::Listening;
                self.render();
                self.restart_listening();
            }
            Err(err) => {
                error!("Failed to initialise recognizer: {err:?}");
                self.screen.prompt = Line::new("FAILED TO INITIALISE", Colour::Red);
                self.screen.output = Line::new("RECOGNISER", Colour::Red);
                self.phase = Phase::Failed;
                self.render();
            }
        }
    }

    pub fn handle_event(&mut self, event: RecognizerEvent) {
        if matches!(
            self.phase,
            Phase::Initializing | Phase::Failed | Phase::ShutDown
        ) {
            debug!("Ignoring {event:?} while {:?}", self.phase);
            return;
        }
        match event {
            RecognizerEvent::BeginningOfSpeech => debug!("Speech detected"),
            RecognizerEvent::PartialResult(hypothesis) | RecognizerEvent::Result(hypothesis) => {
                self.parse_hypothesis(hypothesis)
            }
            RecognizerEvent::EndOfSpeech | RecognizerEvent::Timeout => self.restart_listening(),
            RecognizerEvent::Error(message) => self.show_error(message),
        }
    }

    fn parse_hypothesis(&mut self, hypothesis: Option<Hypothesis>) {
        let Some(hypothesis) = hypothesis else {
            return;
        };

        if let Some(index) = self.commands.find(&hypothesis.text) {
            self.screen.prompt = Line::new("You said", Colour::Black);
            self.screen.output = Line::new(&hypothesis.text, self.commands.colour(index));
            self.phase = Phase::Matched;
            info!("{} detected ({:.3})", hypothesis.text, hypothesis.score);
            self.render();
            self.view.announce(&hypothesis.text);
        }

        self.restart_listening();
    }

    fn restart_listening(&mut self) {
        let Some(recognizer) = self.recognizer.as_mut() else {
            return;
        };
        let restarted = recognizer
            .stop()
            .and_then(|_| recognizer.start_listening(COMMANDS_SEARCH));
        match restarted {
            Ok(()) => self.phase = Phase::Listening,
            Err(err) => self.show_error(format!("{err:#}")),
        }
    }

    fn show_error(&mut self, message: String) {
        error!("Recognizer error: {message}");
        self.screen.output.text = message;
        self.phase = Phase::Error;
        self.render();
    }

    /// Stops the recognizer and releases it. Later events are ignored.
    pub fn shutdown(&mut self) {
        if let Some(mut recognizer) = self.recognizer.take() {
            if let Err(err) = recognizer.cancel() {
                warn!("Cancelling recognizer: {err:#}");
            }
            if let Err(err) = recognizer.shutdown() {
                warn!("Shutting down recognizer: {err:#}");
            }
        }
        self.phase = Phase::ShutDown;
    }

    fn render(&mut self) {
        if let Err(err) = self.view.render(&self.screen) {
            warn!("Cannot draw screen: {err}");
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn view(&self) -> &V {
        &self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, bail};
    use std::cell::RefCell;
    use std::io;
    use std::path::Path;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Start(String),
        Stop,
        Cancel,
        Shutdown,
    }

    #[derive(Default)]
    struct MockRecognizer {
        calls: Rc<RefCell<Vec<Call>>>,
        fail_start: bool,
    }

    impl Recognizer for MockRecognizer {
        fn add_keyword_search(&mut self, _name: &str, _keywords_file: &Path) -> Result<()> {
            Ok(())
        }

        fn start_listening(&mut self, search: &str) -> Result<()> {
            if self.fail_start {
                bail!("microphone unplugged");
            }
            self.calls.borrow_mut().push(Call::Start(search.to_string()));
            Ok(())
        }

        fn stop(&mut self) -> Result<()> {
            self.calls.borrow_mut().push(Call::Stop);
            Ok(())
        }

        fn cancel(&mut self) -> Result<()> {
            self.calls.borrow_mut().push(Call::Cancel);
            Ok(())
        }

        fn shutdown(&mut self) -> Result<()> {
            self.calls.borrow_mut().push(Call::Shutdown);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingView {
        frames: Vec<Screen>,
        announced: Vec<String>,
    }

    impl View for RecordingView {
        fn render(&mut self, screen: &Screen) -> io::Result<()> {
            self.frames.push(screen.clone());
            Ok(())
        }

        fn announce(&mut self, text: &str) {
            self.announced.push(text.to_string());
        }
    }

    type TestController = Controller<MockRecognizer, RecordingView>;

    fn restart() -> Vec<Call> {
        vec![Call::Stop, Call::Start(COMMANDS_SEARCH.to_string())]
    }

    fn listening(commands: &str) -> (TestController, Rc<RefCell<Vec<Call>>>) {
        let recognizer = MockRecognizer::default();
        let calls = recognizer.calls.clone();
        let mut controller = Controller::new(RecordingView::default());
        controller.on_initialised(Ok(Initialised {
            recognizer,
            commands: CommandList::parse(commands),
        }));
        calls.borrow_mut().clear();
        (controller, calls)
    }

    fn result(text: &str) -> RecognizerEvent {
        RecognizerEvent::Result(Some(Hypothesis::new(text, 0.9)))
    }

    #[test]
    fn test_starts_initialising() {
        let controller: TestController = Controller::new(RecordingView::default());
        assert_eq!(controller.phase(), Phase::Initializing);
        assert_eq!(controller.view().frames.len(), 1);
        assert_eq!(controller.screen().prompt.text, "Initialising...");
    }

    #[test]
    fn test_successful_setup_starts_listening() {
        let recognizer = MockRecognizer::default();
        let calls = recognizer.calls.clone();
        let mut controller = Controller::new(RecordingView::default());
        controller.on_initialised(Ok(Initialised {
            recognizer,
            commands: CommandList::parse("stop\n"),
        }));

        assert_eq!(controller.phase(), Phase::Listening);
        assert_eq!(controller.screen().prompt, Line::new("PLEASE", Colour::Red));
        assert_eq!(controller.screen().output, Line::new("SPEAK...", Colour::Red));
        assert_eq!(*calls.borrow(), restart());
    }

    #[test]
    fn test_failed_setup_is_terminal() {
        let mut controller: TestController = Controller::new(RecordingView::default());
        controller.on_initialised(Err(anyhow!("commands.lst: permission denied")));

        assert_eq!(controller.phase(), Phase::Failed);
        assert_eq!(
            controller.screen().prompt,
            Line::new("FAILED TO INITIALISE", Colour::Red)
        );
        assert_eq!(
            controller.screen().output,
            Line::new("RECOGNISER", Colour::Red)
        );

        let frames = controller.view().frames.len();
        controller.handle_event(result("stop"));
        controller.handle_event(RecognizerEvent::EndOfSpeech);
        controller.handle_event(RecognizerEvent::Timeout);
        assert_eq!(controller.phase(), Phase::Failed);
        assert_eq!(controller.view().frames.len(), frames);
    }

    #[test]
    fn test_match_shows_command_in_its_colour() {
        let (mut controller, calls) = listening("go forward\nturn left\nstop\n");
        controller.handle_event(result("stop"));

        assert_eq!(controller.screen().prompt, Line::new("You said", Colour::Black));
        assert_eq!(controller.screen().output, Line::new("stop", Colour::Cyan));
        assert_eq!(controller.view().announced, vec!["stop".to_string()]);
        assert_eq!(*calls.borrow(), restart());
        assert_eq!(controller.phase(), Phase::Listening);
    }

    #[test]
    fn test_partial_results_match_too() {
        let (mut controller, calls) = listening("go forward\n");
        controller.handle_event(RecognizerEvent::PartialResult(Some(Hypothesis::new(
            "go forward",
            0.5,
        ))));
        assert_eq!(controller.screen().output, Line::new("go forward", Colour::Blue));
        assert_eq!(*calls.borrow(), restart());
    }

    #[test]
    fn test_colours_repeat_past_the_palette() {
        let (mut controller, _) = listening("a\nb\nc\nd\ne\nf\ng");
        controller.handle_event(result("f"));
        assert_eq!(controller.screen().output.colour, Colour::Blue);
        controller.handle_event(result("g"));
        assert_eq!(controller.screen().output.colour, Colour::Green);
        controller.handle_event(result("e"));
        assert_eq!(controller.screen().output.colour, Colour::Black);
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let (mut controller, calls) = listening("stop\n");
        let before = controller.screen().clone();
        controller.handle_event(result("Stop"));

        assert_eq!(*controller.screen(), before);
        assert!(controller.view().announced.is_empty());
        // No match still resumes listening.
        assert_eq!(*calls.borrow(), restart());
    }

    #[test]
    fn test_missing_hypothesis_changes_nothing() {
        let (mut controller, calls) = listening("stop\n\n");
        let frames = controller.view().frames.len();
        controller.handle_event(RecognizerEvent::Result(None));
        controller.handle_event(RecognizerEvent::PartialResult(None));

        assert_eq!(controller.view().frames.len(), frames);
        assert_eq!(controller.phase(), Phase::Listening);
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_empty_hypothesis_resumes_listening() {
        let (mut controller, calls) = listening("stop\n\n");
        let frames = controller.view().frames.len();
        let before = controller.screen().clone();
        controller.handle_event(result(""));

        assert_eq!(controller.view().frames.len(), frames);
        assert_eq!(*controller.screen(), before);
        assert!(controller.view().announced.is_empty());
        assert_eq!(*calls.borrow(), restart());
    }

    #[test]
    fn test_end_of_speech_and_timeout_restart() {
        let (mut controller, calls) = listening("stop\n");
        controller.handle_event(RecognizerEvent::BeginningOfSpeech);
        assert!(calls.borrow().is_empty());
        controller.handle_event(RecognizerEvent::EndOfSpeech);
        controller.handle_event(RecognizerEvent::Timeout);
        let mut expected = restart();
        expected.extend(restart());
        assert_eq!(*calls.borrow(), expected);
    }

    #[test]
    fn test_error_is_shown_verbatim() {
        let (mut controller, calls) = listening("stop\n");
        controller.handle_event(result("stop"));
        calls.borrow_mut().clear();

        controller.handle_event(RecognizerEvent::Error("decoder crashed".to_string()));
        assert_eq!(controller.phase(), Phase::Error);
        assert_eq!(controller.screen().output.text, "decoder crashed");
        assert_eq!(controller.screen().output.colour, Colour::Blue);
        assert!(calls.borrow().is_empty());

        // Results keep being handled after an error.
        controller.handle_event(result("stop"));
        assert_eq!(controller.screen().output.text, "stop");
        assert_eq!(controller.phase(), Phase::Listening);
    }

    #[test]
    fn test_failed_restart_is_shown_as_error() {
        let recognizer = MockRecognizer {
            fail_start: true,
            ..Default::default()
        };
        let mut controller = Controller::new(RecordingView::default());
        controller.on_initialised(Ok(Initialised {
            recognizer,
            commands: CommandList::parse("stop\n"),
        }));
        assert_eq!(controller.phase(), Phase::Error);
        assert_eq!(controller.screen().output.text, "microphone unplugged");
    }

    #[test]
    fn test_shutdown_releases_recognizer_and_ignores_late_events() {
        let (mut controller, calls) = listening("stop\n");
        controller.shutdown();
        assert_eq!(*calls.borrow(), vec![Call::Cancel, Call::Shutdown]);
        assert_eq!(controller.phase(), Phase::ShutDown);

        controller.handle_event(result("stop"));
        controller.handle_event(RecognizerEvent::EndOfSpeech);
        assert_eq!(*calls.borrow(), vec![Call::Cancel, Call::Shutdown]);
        assert_eq!(controller.screen().output.text, "SPEAK...");
    }
}
