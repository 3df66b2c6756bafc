//! Store and supplier reference data, cached as flat files.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::file_io::{csv_error, open_csv, read_dir_files, remove_file, write_csv_atomically};
use crate::StoreError;

const STORES_FILE: &str = "lojas.csv";
const SUPPLIERS_FILE: &str = "fornecedores.csv";
const GROUPS_DIR: &str = "grupos";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub code: String,
    pub display_name: String,
}

impl Store {
    #[must_use]
    pub fn new(code: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            display_name: display_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupplierCatalog {
    pub supplier: String,
    pub groups: BTreeSet<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreRecord {
    store_code: String,
    store_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SupplierRecord {
    supplier: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct GroupRecord {
    group: String,
}

/// File name stem for a supplier's group list.
///
/// A readable slug (lowercased ASCII alphanumerics, everything else collapsed
/// into single dashes) followed by the first 16 hex digits of the SHA-256 of
/// the exact supplier name, e.g. `"Mann Filter"` → `"mann-filter-<hash>"`.
/// Names differing only by case or punctuation get distinct files.
#[must_use]
pub fn supplier_slug(supplier: &str) -> String {
    let readable = supplier
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let digest = format!("{:x}", Sha256::digest(supplier.as_bytes()));
    if readable.is_empty() {
        format!("_-{}", &digest[..16])
    } else {
        format!("{readable}-{}", &digest[..16])
    }
}

/// Flat-file snapshot of the catalog rooted at one directory:
///
/// ```text
/// <dir>/lojas.csv            store_code,store_name
/// <dir>/fornecedores.csv     supplier
/// <dir>/grupos/<slug>-<hash>.csv    group
/// ```
#[derive(Debug, Clone)]
pub struct CatalogStore {
    dir: PathBuf,
}

impl CatalogStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn stores_path(&self) -> PathBuf {
        self.dir.join(STORES_FILE)
    }

    fn suppliers_path(&self) -> PathBuf {
        self.dir.join(SUPPLIERS_FILE)
    }

    fn groups_dir(&self) -> PathBuf {
        self.dir.join(GROUPS_DIR)
    }

    fn groups_path(&self, supplier: &str) -> PathBuf {
        self.groups_dir()
            .join(format!("{}.csv", supplier_slug(supplier)))
    }

    /// # Errors
    ///
    /// Returns [`StoreError::CatalogMissing`] if the stores file has not been
    /// built yet, or an IO/CSV error if it cannot be read.
    pub fn load_stores(&self) -> Result<Vec<Store>, StoreError> {
        let path = self.stores_path();
        let records: Vec<StoreRecord> = read_records(&path)?;
        Ok(records
            .into_iter()
            .map(|r| Store::new(r.store_code, r.store_name))
            .collect())
    }

    /// # Errors
    ///
    /// Returns [`StoreError::CatalogMissing`] if the suppliers file has not
    /// been built yet, or an IO/CSV error if it cannot be read.
    pub fn load_suppliers(&self) -> Result<Vec<String>, StoreError> {
        let path = self.suppliers_path();
        let records: Vec<SupplierRecord> = read_records(&path)?;
        Ok(records.into_iter().map(|r| r.supplier).collect())
    }

    /// # Errors
    ///
    /// Returns [`StoreError::CatalogMissing`] if no group file exists for
    /// `supplier`, or an IO/CSV error if it cannot be read.
    pub fn load_groups(&self, supplier: &str) -> Result<BTreeSet<String>, StoreError> {
        let path = self.groups_path(supplier);
        let records: Vec<GroupRecord> = read_records(&path)?;
        Ok(records.into_iter().map(|r| r.group).collect())
    }

    /// Replace the stores file.
    ///
    /// # Errors
    ///
    /// Returns an IO/CSV error if the file cannot be written.
    pub fn save_stores(&self, stores: &[Store]) -> Result<(), StoreError> {
        write_csv_atomically(&self.stores_path(), |w| {
            w.write_record(["store_code", "store_name"])?;
            for store in stores {
                w.write_record([store.code.as_str(), store.display_name.as_str()])?;
            }
            Ok(())
        })
    }

    /// Replace the supplier list and every per-supplier group file. Group
    /// files for suppliers no longer present are removed.
    ///
    /// # Errors
    ///
    /// Returns an IO/CSV error if any file cannot be written or removed.
    pub fn save_suppliers(&self, catalogs: &[SupplierCatalog]) -> Result<(), StoreError> {
        let mut kept = BTreeSet::new();
        for catalog in catalogs {
            let path = self.groups_path(&catalog.supplier);
            write_csv_atomically(&path, |w| {
                w.write_record(["group"])?;
                for group in &catalog.groups {
                    w.write_record([group.as_str()])?;
                }
                Ok(())
            })?;
            kept.insert(path);
        }

        for stale in read_dir_files(&self.groups_dir())? {
            if !kept.contains(&stale) {
                tracing::debug!(path = %stale.display(), "removing stale supplier group file");
                remove_file(&stale)?;
            }
        }

        // suppliers file last: it is what readers consult first
        write_csv_atomically(&self.suppliers_path(), |w| {
            w.write_record(["supplier"])?;
            for catalog in catalogs {
                w.write_record([catalog.supplier.as_str()])?;
            }
            Ok(())
        })
    }
}

fn read_records<T>(path: &Path) -> Result<Vec<T>, StoreError>
where
    T: for<'de> Deserialize<'de>,
{
    let Some(mut reader) = open_csv(path)? else {
        return Err(StoreError::CatalogMissing(path.display().to_string()));
    };

    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| csv_error(path, e))
}
