/// Row of the two-line status display.
#[derive(Debug, Clone, Copy, PartialEq, defmt::Format)]
pub enum Row {
    Top,
    Bottom,
}

/// Progress and result display.
///
/// Fire-and-forget: implementations swallow their own I/O errors and
/// must not block the sampling cadence.
pub trait Screen {
    /// Replace `row` with `text`.
    fn print(&mut self, row: Row, text: &str);

    fn clear(&mut self) {}
}

/// Discards everything. For headless deployments and tests.
pub struct NullScreen;

impl Screen for NullScreen {
    fn print(&mut self, _row: Row, _text: &str) {}
}
