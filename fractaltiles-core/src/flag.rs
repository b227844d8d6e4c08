/// Read-and-clear invalidation flag.
///
/// Each component that can invalidate the view owns one. Only the composer's
/// draw reads them, and reading clears.
#[derive(Debug, Clone, Default)]
pub struct DirtyFlag {
    set: bool,
}

impl DirtyFlag {
    pub fn new(initially_set: bool) -> Self {
        Self { set: initially_set }
    }

    pub fn set(&mut self) {
        self.set = true;
    }

    pub fn is_set(&self) -> bool {
        self.set
    }

    /// Returns the previous value and clears the flag.
    pub fn read_and_clear(&mut self) -> bool {
        std::mem::take(&mut self.set)
    }
}
