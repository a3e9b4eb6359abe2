use crate::detect::model::MotionModel;
use crate::error::CaptureError;
use crate::frame::{Frame, ForegroundMask, BACKGROUND, FOREGROUND};

/// Tuning for [`BackgroundSubtractor`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SubtractorParams {
    /// Number of frames the learning rate averages over once warmed up.
    pub history: u32,
    /// Squared Mahalanobis distance above which a pixel is foreground.
    pub var_threshold: f32,
    /// Variance assigned to every pixel when the model (re)initialises.
    pub var_init: f32,
    pub var_min: f32,
    pub var_max: f32,
}

impl Default for SubtractorParams {
    fn default() -> Self {
        Self {
            history: 500,
            var_threshold: 16.0,
            var_init: 225.0,
            var_min: 4.0,
            var_max: 5.0 * 225.0,
        }
    }
}

/// Adaptive per-pixel single-Gaussian background model on the luma channel.
///
/// The first frame (and any frame whose dimensions differ from the model)
/// seeds the background and yields an all-background mask.
pub struct BackgroundSubtractor {
    params: SubtractorParams,
    width: u32,
    height: u32,
    mean: Vec<f32>,
    variance: Vec<f32>,
    frames_seen: u32,
}

impl BackgroundSubtractor {
    pub fn new(params: SubtractorParams) -> Result<Self, CaptureError> {
        if params.history == 0 {
            return Err(CaptureError::InvalidConfig(
                "subtractor history must be >= 1".to_string(),
            ));
        }
        if !(params.var_threshold > 0.0 && params.var_min > 0.0 && params.var_max >= params.var_min)
        {
            return Err(CaptureError::InvalidConfig(format!(
                "invalid subtractor variances: {:?}",
                params
            )));
        }
        Ok(Self {
            params,
            width: 0,
            height: 0,
            mean: Vec::new(),
            variance: Vec::new(),
            frames_seen: 0,
        })
    }

    pub fn frames_seen(&self) -> u32 {
        self.frames_seen
    }

    fn seed(&mut self, luma: Vec<u8>, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.variance = vec![self.params.var_init; luma.len()];
        self.mean = luma.into_iter().map(f32::from).collect();
        self.frames_seen = 1;
    }
}

impl Default for BackgroundSubtractor {
    fn default() -> Self {
        Self {
            params: SubtractorParams::default(),
            width: 0,
            height: 0,
            mean: Vec::new(),
            variance: Vec::new(),
            frames_seen: 0,
        }
    }
}

impl MotionModel for BackgroundSubtractor {
    fn name(&self) -> &'static str {
        "background-subtractor"
    }

    fn apply(&mut self, frame: &Frame) -> Result<ForegroundMask, CaptureError> {
        let (width, height) = (frame.width(), frame.height());
        let luma = frame.luma();

        if self.frames_seen == 0 || width != self.width || height != self.height {
            if self.frames_seen > 0 {
                log::debug!(
                    "background model reset: {}x{} -> {}x{}",
                    self.width,
                    self.height,
                    width,
                    height
                );
            }
            self.seed(luma, width, height);
            return ForegroundMask::uniform(width, height, BACKGROUND);
        }

        self.frames_seen = self.frames_seen.saturating_add(1);
        let alpha = 1.0 / self.frames_seen.min(self.params.history) as f32;
        let p = self.params;

        let mut mask = Vec::with_capacity(luma.len());
        for ((&x, mean), var) in luma
            .iter()
            .zip(self.mean.iter_mut())
            .zip(self.variance.iter_mut())
        {
            let d = f32::from(x) - *mean;
            let d2 = d * d;
            mask.push(if d2 > p.var_threshold * *var {
                FOREGROUND
            } else {
                BACKGROUND
            });
            *mean += alpha * d;
            *var = (*var + alpha * (d2 - *var)).clamp(p.var_min, p.var_max);
        }

        ForegroundMask::new(mask, width, height)
    }
}
