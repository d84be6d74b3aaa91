use crate::config::Files;

/// Inclusion rules for directory listings: hidden entries are skipped and
/// files must carry an allow-listed extension.
#[derive(Debug, Clone)]
pub struct EntryFilter {
    // lowercase, each with its leading dot
    suffixes: Vec<String>,
}

impl EntryFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let suffixes = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .map(|e| format!(".{e}"))
            .collect();
        Self { suffixes }
    }

    pub fn from_config(files: &Files) -> Self {
        Self::new(&files.allowed_extensions)
    }

    pub fn include_dir(&self, name: &str) -> bool {
        !is_hidden(name)
    }

    pub fn include_file(&self, name: &str) -> bool {
        if is_hidden(name) {
            return false;
        }
        let lower = name.to_lowercase();
        self.suffixes.iter().any(|s| lower.ends_with(s.as_str()))
    }
}

impl Default for EntryFilter {
    fn default() -> Self {
        Self::new(["md", "txt"])
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}
