use std::time::Duration;

use anyhow::Result;

use crate::frame::Frame;

/// How long a detected frame stays on screen before the loop moves on.
pub const SHOW_DURATION: Duration = Duration::from_millis(10);

/// Renders detected frames. Fire-and-forget: callers log and ignore errors.
pub trait Preview {
    fn show(&mut self, frame: &Frame) -> Result<()>;
}

/// On-screen window backed by `minifb`.
///
/// The window is created on the first frame and recreated whenever the frame
/// size changes. It must stay on the thread that created it.
#[cfg(feature = "preview")]
pub struct WindowPreview {
    title: String,
    window: Option<(minifb::Window, u32, u32)>,
}

#[cfg(feature = "preview")]
impl WindowPreview {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            window: None,
        }
    }
}

#[cfg(feature = "preview")]
impl Preview for WindowPreview {
    fn show(&mut self, frame: &Frame) -> Result<()> {
        use minifb::{Window, WindowOptions};

        let (width, height) = (frame.width(), frame.height());
        let stale = match &self.window {
            Some((window, w, h)) => !window.is_open() || (*w, *h) != (width, height),
            None => true,
        };
        if stale {
            let window = Window::new(
                &self.title,
                width as usize,
                height as usize,
                WindowOptions::default(),
            )?;
            self.window = Some((window, width, height));
        }

        if let Some((window, _, _)) = self.window.as_mut() {
            window.update_with_buffer(&frame.to_0rgb(), width as usize, height as usize)?;
        }
        std::thread::sleep(SHOW_DURATION);
        Ok(())
    }
}
