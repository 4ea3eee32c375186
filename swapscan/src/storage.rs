// Standard library imports
use std::path::{Path, PathBuf};

// Internal imports
use swapscan_common::models::{Checkpoint, SwapRecord};

// Third party imports
use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, info, warn};

/// Lỗi đọc/ghi file output và checkpoint
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt JSON in {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Validation of {} failed: {reason}", .path.display())]
    Validation { path: PathBuf, reason: String },
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// File tồn tại nhưng không parse được
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}

/// Đường dẫn file tạm nằm cạnh file đích, để rename là thao tác nguyên tử
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::io(path, e)),
    }
}

async fn write_temp(tmp: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

async fn discard_temp(tmp: &Path) {
    if let Err(e) = fs::remove_file(tmp).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove temp file {}: {}", tmp.display(), e);
        }
    }
}

/// Ghi `bytes` ra file tạm, fsync, đọc lại và kiểm tra bằng `validate`, rồi rename đè lên `path`.
///
/// Nếu ghi hoặc kiểm tra thất bại, file tạm bị xóa và `path` giữ nguyên.
pub async fn commit_validated<V>(
    path: &Path,
    bytes: &[u8],
    validate: V,
) -> Result<(), StorageError>
where
    V: Fn(&[u8]) -> Result<(), String>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::io(parent, e))?;
    }

    let tmp = temp_path(path);
    if let Err(e) = write_temp(&tmp, bytes).await {
        discard_temp(&tmp).await;
        return Err(StorageError::io(&tmp, e));
    }

    let written = match fs::read(&tmp).await {
        Ok(written) => written,
        Err(e) => {
            discard_temp(&tmp).await;
            return Err(StorageError::io(&tmp, e));
        }
    };
    if let Err(reason) = validate(&written) {
        discard_temp(&tmp).await;
        return Err(StorageError::Validation {
            path: tmp,
            reason,
        });
    }

    fs::rename(&tmp, path).await.map_err(|e| StorageError::io(path, e))?;
    Ok(())
}

/// Đổi tên file sang `<file>.<label>-<UTC timestamp>`; trả về đường dẫn mới nếu file tồn tại
pub async fn backup_file(path: &Path, label: &str) -> Result<Option<PathBuf>, StorageError> {
    if fs::metadata(path).await.is_err() {
        return Ok(None);
    }

    let stamp = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
    let base = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();

    let mut target = path.with_file_name(format!("{}.{}-{}", base, label, stamp));
    let mut counter = 1;
    while fs::metadata(&target).await.is_ok() {
        target = path.with_file_name(format!("{}.{}-{}-{}", base, label, stamp, counter));
        counter += 1;
    }

    fs::rename(path, &target).await.map_err(|e| StorageError::io(path, e))?;
    warn!("Moved {} aside to {}", path.display(), target.display());
    Ok(Some(target))
}

/// Kiểm tra bytes là một JSON array có đúng `expected` phần tử
fn validate_array(bytes: &[u8], expected: usize) -> Result<(), String> {
    let parsed: Vec<Value> = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
    if parsed.len() != expected {
        return Err(format!("expected {} records, found {}", expected, parsed.len()));
    }
    Ok(())
}

/// File output dạng JSON array chứa các `SwapRecord`
#[derive(Debug, Clone)]
pub struct OutputStore {
    path: PathBuf,
}

impl OutputStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Đọc toàn bộ bản ghi dưới dạng JSON value, `None` nếu file chưa tồn tại
    pub async fn load(&self) -> Result<Option<Vec<Value>>, StorageError> {
        let Some(bytes) = read_optional(&self.path).await? else {
            return Ok(None);
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StorageError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }

    /// Đọc toàn bộ bản ghi dưới dạng `SwapRecord`
    pub async fn load_records(&self) -> Result<Vec<SwapRecord>, StorageError> {
        let Some(bytes) = read_optional(&self.path).await? else {
            return Ok(Vec::new());
        };

        serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Số bản ghi hiện có, tính bằng parse đầy đủ file
    pub async fn count_records(&self) -> Result<usize, StorageError> {
        Ok(self.load().await?.map(|records| records.len()).unwrap_or(0))
    }

    /// Ghi thêm bản ghi vào cuối file, trả về tổng số bản ghi sau khi ghi
    pub async fn append(&self, records: &[SwapRecord]) -> Result<usize, StorageError> {
        let mut all = self.load().await?.unwrap_or_default();
        let previous = all.len();

        for record in records {
            let value = serde_json::to_value(record).map_err(|source| StorageError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
            all.push(value);
        }

        self.write_all(&all).await?;
        debug!(
            "Appended {} records to {} ({} -> {})",
            records.len(),
            self.path.display(),
            previous,
            all.len()
        );
        Ok(all.len())
    }

    /// Tạo file rỗng `[]` nếu chưa có bản ghi nào được ghi
    pub async fn ensure_exists(&self) -> Result<(), StorageError> {
        if read_optional(&self.path).await?.is_none() {
            self.write_all(&[]).await?;
        }
        Ok(())
    }

    /// Giữ lại `keep` bản ghi đầu tiên
    pub async fn truncate(&self, keep: usize) -> Result<usize, StorageError> {
        let mut all = self.load().await?.unwrap_or_default();
        if all.len() <= keep {
            return Ok(all.len());
        }

        let dropped = all.len() - keep;
        all.truncate(keep);
        self.write_all(&all).await?;
        info!("Truncated {} to {} records (dropped {})", self.path.display(), keep, dropped);
        Ok(keep)
    }

    async fn write_all(&self, records: &[Value]) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(records).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        let expected = records.len();
        commit_validated(&self.path, &bytes, |written| validate_array(written, expected)).await
    }

    pub async fn backup(&self, label: &str) -> Result<Option<PathBuf>, StorageError> {
        backup_file(&self.path, label).await
    }
}

/// File checkpoint lưu tiến độ quét
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Option<Checkpoint>, StorageError> {
        let Some(bytes) = read_optional(&self.path).await? else {
            return Ok(None);
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StorageError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }

    pub async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(checkpoint).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        commit_validated(&self.path, &bytes, |written| {
            serde_json::from_slice::<Checkpoint>(written)
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .await
    }

    /// Xóa checkpoint khi đã quét xong toàn bộ
    pub async fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(&self.path, e)),
        }
    }

    pub async fn backup(&self, label: &str) -> Result<Option<PathBuf>, StorageError> {
        backup_file(&self.path, label).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swapscan_common::models::swap::iso_datetime;
    use tempfile::tempdir;

    fn record(block: u64, index: u64) -> SwapRecord {
        SwapRecord {
            timestamp: 1_700_000_000 + block,
            datetime: iso_datetime(1_700_000_000 + block),
            block_number: block,
            transaction_hash: format!("0x{:064x}", block * 100 + index),
            log_index: Some(index),
            sender: format!("0x{:040x}", 1),
            recipient: format!("0x{:040x}", 2),
            amount0: "0.5".to_string(),
            amount1: "-30000".to_string(),
            price: Some(60000.0),
            tick: "-197310".to_string(),
        }
    }

    #[tokio::test]
    async fn test_append_creates_file() {
        let dir = tempdir().unwrap();
        let store = OutputStore::new(dir.path().join("swaps.json"));

        assert_eq!(store.count_records().await.unwrap(), 0);
        let total = store.append(&[record(1, 0), record(1, 1)]).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(store.load_records().await.unwrap(), vec![record(1, 0), record(1, 1)]);
        assert!(!temp_path(store.path()).exists());
    }

    #[tokio::test]
    async fn test_append_preserves_order_across_chunks() {
        let dir = tempdir().unwrap();
        let store = OutputStore::new(dir.path().join("swaps.json"));

        let mut expected = Vec::new();
        for chunk in 0..5u64 {
            let batch: Vec<_> = (0..chunk).map(|i| record(chunk * 10, i)).collect();
            let total = store.append(&batch).await.unwrap();
            expected.extend(batch);
            assert_eq!(total, expected.len());
        }

        assert_eq!(store.load_records().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_append_keeps_unknown_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("swaps.json");
        fs::write(&path, r#"[{"blockNumber": 1, "extra": "kept"}]"#).await.unwrap();

        let store = OutputStore::new(&path);
        assert_eq!(store.append(&[record(2, 0)]).await.unwrap(), 2);

        let values = store.load().await.unwrap().unwrap();
        assert_eq!(values[0]["extra"], "kept");
        assert_eq!(values[1]["blockNumber"], 2);
    }

    #[tokio::test]
    async fn test_append_to_corrupt_file_leaves_it_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("swaps.json");
        fs::write(&path, b"[{\"blockNumber\": 1},").await.unwrap();

        let store = OutputStore::new(&path);
        let err = store.append(&[record(2, 0)]).await.unwrap_err();
        assert!(err.is_corrupt());
        assert_eq!(fs::read(&path).await.unwrap(), b"[{\"blockNumber\": 1},");
    }

    #[tokio::test]
    async fn test_failed_validation_keeps_original_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("swaps.json");
        let store = OutputStore::new(&path);
        store.append(&[record(1, 0)]).await.unwrap();
        let before = fs::read(&path).await.unwrap();

        let err = commit_validated(&path, b"[1, 2, 3]", |_| Err("rejected".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Validation { .. }));
        assert_eq!(fs::read(&path).await.unwrap(), before);
        assert!(!temp_path(&path).exists());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_failed_write_removes_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("swaps.json");
        let store = OutputStore::new(&path);
        store.append(&[record(1, 0)]).await.unwrap();
        let before = fs::read(&path).await.unwrap();

        // Mọi lần ghi vào /dev/full đều trả về ENOSPC
        let tmp = temp_path(&path);
        std::os::unix::fs::symlink("/dev/full", &tmp).unwrap();

        let err = store.append(&[record(2, 0)]).await.unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
        assert!(std::fs::symlink_metadata(&tmp).is_err());
        assert_eq!(fs::read(&path).await.unwrap(), before);

        // Lần ghi sau không còn bị file tạm cũ cản trở
        assert_eq!(store.append(&[record(2, 0)]).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_truncate() {
        let dir = tempdir().unwrap();
        let store = OutputStore::new(dir.path().join("swaps.json"));
        store.append(&[record(1, 0), record(2, 0), record(3, 0)]).await.unwrap();

        assert_eq!(store.truncate(5).await.unwrap(), 3);
        assert_eq!(store.truncate(1).await.unwrap(), 1);
        assert_eq!(store.load_records().await.unwrap(), vec![record(1, 0)]);
    }

    #[tokio::test]
    async fn test_backup_moves_file_aside() {
        let dir = tempdir().unwrap();
        let store = OutputStore::new(dir.path().join("swaps.json"));
        assert_eq!(store.backup("corrupt").await.unwrap(), None);

        store.append(&[record(1, 0)]).await.unwrap();
        let first = store.backup("corrupt").await.unwrap().unwrap();
        assert!(first.exists());
        assert!(!store.path().exists());
        assert!(first.file_name().unwrap().to_string_lossy().starts_with("swaps.json.corrupt-"));

        // Cùng một giây vẫn không ghi đè bản backup trước
        store.append(&[record(2, 0)]).await.unwrap();
        let second = store.backup("corrupt").await.unwrap().unwrap();
        assert_ne!(first, second);
        assert!(first.exists() && second.exists());
    }

    #[tokio::test]
    async fn test_checkpoint_roundtrip_and_clear() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("progress.json"));
        assert_eq!(store.load().await.unwrap(), None);

        let checkpoint = Checkpoint::new(149, 4, 100, 249);
        store.save(&checkpoint).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(checkpoint));

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_checkpoint_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.json");
        fs::write(&path, b"{\"lastProcessedBlock\": ").await.unwrap();

        let err = CheckpointStore::new(&path).load().await.unwrap_err();
        assert!(err.is_corrupt());
    }
}
