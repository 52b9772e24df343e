use crate::acquisition::common::error::Result;

/// Producer of protocol lines, live device or saved capture.
pub trait LineSource {
    /// Next line without its line ending, `None` once the stream is exhausted.
    fn next_line(&mut self) -> Result<Option<String>>;

    /// Sends a command towards the instrument. Sources without a device accept and drop it.
    fn send_command(&mut self, command: &str) -> Result<()>;
}
