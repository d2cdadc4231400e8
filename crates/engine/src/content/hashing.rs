use sha2::{Digest, Sha256};

/// Incremental SHA-256 over every content file in load order.
///
/// The mod id and relative path are part of the digest so that moving a file
/// between mods, or reordering enabled mods, changes the fingerprint.
#[derive(Default)]
pub(crate) struct ContentFingerprint {
    hasher: Sha256,
    file_count: usize,
}

impl ContentFingerprint {
    pub fn update(&mut self, mod_id: &str, rel_path: &str, contents: &[u8]) {
        self.hasher.update(mod_id.as_bytes());
        self.hasher.update([0u8]);
        self.hasher.update(rel_path.as_bytes());
        self.hasher.update([0u8]);
        self.hasher.update((contents.len() as u64).to_le_bytes());
        self.hasher.update(contents);
        self.file_count += 1;
    }

    pub fn file_count(&self) -> usize {
        self.file_count
    }

    pub fn finish(self) -> String {
        to_hex_lower(&self.hasher.finalize())
    }
}

fn to_hex_lower(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint(files: &[(&str, &str, &str)]) -> String {
        let mut fingerprint = ContentFingerprint::default();
        for (mod_id, rel, contents) in files {
            fingerprint.update(mod_id, rel, contents.as_bytes());
        }
        fingerprint.finish()
    }

    #[test]
    fn fingerprint_is_stable_and_hex() {
        let a = fingerprint(&[("base", "defs.xml", "<Defs/>")]);
        let b = fingerprint(&[("base", "defs.xml", "<Defs/>")]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn fingerprint_changes_on_edit_move_or_reorder() {
        let original = fingerprint(&[
            ("base", "defs.xml", "<Defs/>"),
            ("moda", "defs.xml", "<Defs><A/></Defs>"),
        ]);
        let edited = fingerprint(&[
            ("base", "defs.xml", "<Defs/>"),
            ("moda", "defs.xml", "<Defs><B/></Defs>"),
        ]);
        let moved = fingerprint(&[
            ("base", "defs.xml", "<Defs/>"),
            ("modb", "defs.xml", "<Defs><A/></Defs>"),
        ]);
        let reordered = fingerprint(&[
            ("moda", "defs.xml", "<Defs><A/></Defs>"),
            ("base", "defs.xml", "<Defs/>"),
        ]);
        assert_ne!(original, edited);
        assert_ne!(original, moved);
        assert_ne!(original, reordered);
    }
}
