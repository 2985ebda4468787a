use std::fmt;

/// Counters for one transfer session.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Statistics {
    pub files_found: usize,
    pub files_copied: usize,
    pub bytes_copied: u64,
    /// Capture files already present at the destination.
    pub files_duplicate: usize,
    /// Files older than the cutoff.
    pub files_too_early: usize,
    /// Capture files held back because they may still be written to.
    pub files_withheld: usize,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_files_found(&mut self, count: usize) {
        self.files_found += count;
    }

    pub fn add_file_copied(&mut self, bytes: u64) {
        self.files_copied += 1;
        self.bytes_copied += bytes;
    }

    pub fn add_duplicates(&mut self, count: usize) {
        self.files_duplicate += count;
    }

    pub fn add_too_early(&mut self, count: usize) {
        self.files_too_early += count;
    }

    pub fn add_withheld(&mut self) {
        self.files_withheld += 1;
    }

    pub fn files_skipped(&self) -> usize {
        self.files_duplicate + self.files_too_early + self.files_withheld
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Statistics:")?;
        writeln!(f, "    Files found:         {}", self.files_found)?;
        writeln!(f, "    Files copied:        {}", self.files_copied)?;
        writeln!(f, "    Bytes read:          {}", self.bytes_copied)?;
        writeln!(f, "    Already present:     {}", self.files_duplicate)?;
        writeln!(f, "    Before cutoff:       {}", self.files_too_early)?;
        write!(f, "    Withheld (latest):   {}", self.files_withheld)
    }
}
