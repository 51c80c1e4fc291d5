use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::fs;

use validate_arxml::{IndexedTree, build, index};

/// Test fixture paths
pub struct TestFixtures {
    pub fixtures_dir: PathBuf,
}

impl TestFixtures {
    pub fn new() -> Self {
        let fixtures_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures");

        Self { fixtures_dir }
    }

    pub fn configs_dir(&self) -> PathBuf {
        self.fixtures_dir.join("configs")
    }

    pub fn strict_config(&self) -> PathBuf {
        self.configs_dir().join("strict.toml")
    }

    /// All four required categories, references resolvable
    pub fn complete_ecu(&self) -> PathBuf {
        self.fixtures_dir.join("ecu_complete.arxml")
    }

    /// `complete_ecu` with reordered siblings and three real edits
    pub fn updated_ecu(&self) -> PathBuf {
        self.fixtures_dir.join("ecu_updated.arxml")
    }

    /// Missing Software-Component and Diagnostic, dangling reference
    pub fn incomplete_ecu(&self) -> PathBuf {
        self.fixtures_dir.join("ecu_incomplete.arxml")
    }

    pub fn malformed(&self) -> PathBuf {
        self.fixtures_dir.join("malformed.arxml")
    }

    pub fn blank(&self) -> PathBuf {
        self.fixtures_dir.join("blank.arxml")
    }
}

/// Build and index a document held in memory
pub fn indexed(doc: &str) -> IndexedTree {
    index(build(doc.as_bytes()).expect("document should parse"))
}

/// Build and index a fixture file
pub async fn indexed_fixture(path: &Path) -> IndexedTree {
    let bytes = fs::read(path).await.expect("fixture should be readable");
    index(build(&bytes).expect("fixture should parse"))
}

/// Encode text as UTF-16 little endian with a byte order mark
pub fn utf16le_with_bom(text: &str) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xFE];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes
}

/// File system test utilities
pub async fn create_test_file(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, content).await
}

/// Temporary directory holding the given `(name, content)` documents
pub async fn create_temp_documents(documents: &[(&str, &str)]) -> std::io::Result<TempDir> {
    let temp_dir = TempDir::new()?;
    for (name, content) in documents {
        create_test_file(&temp_dir.path().join(name), content).await?;
    }
    Ok(temp_dir)
}

pub const MINIMAL_COMPLETE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<AUTOSAR>
  <ECU><SHORT-NAME>E1</SHORT-NAME></ECU>
  <Software-Component/>
  <Diagnostic/>
  <Communication/>
</AUTOSAR>"#;

pub const NO_CATEGORIES: &str = r#"<?xml version="1.0"?>
<AUTOSAR><PACKAGE><SHORT-NAME>Empty</SHORT-NAME></PACKAGE></AUTOSAR>"#;
