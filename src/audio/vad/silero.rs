use super::N_SAMPLES;
use ndarray::{Array, Array2, ArrayBase, ArrayD, Dim, IxDynImpl, OwnedRepr};

#[cfg(not(any(feature = "cuda", feature = "metal")))]
use ort::execution_providers::CPUExecutionProvider;
#[cfg(feature = "cuda")]
use ort::execution_providers::CUDAExecutionProvider;
#[cfg(feature = "metal")]
use ort::execution_providers::CoreMLExecutionProvider;

use ort::session::{Session, SessionInputs};
use std::path::Path;

/// Silero voice activity model, scoring one frame at a time.
#[derive(Debug)]
pub struct Silero {
    session: Session,
    sample_rate: ArrayBase<OwnedRepr<i64>, Dim<[usize; 1]>>,
    frame: ArrayBase<OwnedRepr<f32>, Dim<[usize; 2]>>,
    state: ArrayBase<OwnedRepr<f32>, Dim<IxDynImpl>>,
}

impl Silero {
    pub fn new(sample_rate: i64, model_path: impl AsRef<Path>) -> Result<Self, ort::Error> {
        #[cfg(feature = "cuda")]
        let provider = CUDAExecutionProvider::default().build().error_on_failure();
        #[cfg(feature = "metal")]
        let provider = CoreMLExecutionProvider::default()
            .build()
            .error_on_failure();
        #[cfg(not(any(feature = "cuda", feature = "metal")))]
        let provider = CPUExecutionProvider::default().build().error_on_failure();
        let session = Session::builder()?
            .with_execution_providers([provider])?
            .commit_from_file(model_path)?;
        Ok(Self {
            frame: Array2::<f32>::zeros([1, N_SAMPLES]),
            session,
            sample_rate: Array::from_elem([1], sample_rate),
            state: Self::initial_state(),
        })
    }

    fn initial_state() -> ArrayD<f32> {
        ArrayD::<f32>::zeros([2, 1, 128].as_slice())
    }

    /// Forgets the recurrent state, as at the start of a new stream.
    pub fn reset(&mut self) {
        self.state = Self::initial_state();
    }

    /// Probability that `audio_frame` contains speech.
    pub fn calc_level(&mut self, audio_frame: &[f32; N_SAMPLES]) -> Result<f32, ort::Error> {
        self.frame.iter_mut().zip(audio_frame).for_each(|(s, ns)| {
            *s = *ns;
        });
        let inps = ort::inputs![
            self.frame.clone(),
            std::mem::take(&mut self.state),
            self.sample_rate.clone(),
        ]?;
        let res = self.session.run(SessionInputs::ValueSlice::<3>(&inps))?;
        self.state = res["stateN"].try_extract_tensor::<f32>()?.to_owned();
        let (_, output) = res["output"].try_extract_raw_tensor::<f32>()?;
        Ok(output.first().copied().unwrap_or(0.0))
    }
}
