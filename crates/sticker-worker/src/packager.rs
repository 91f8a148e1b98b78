//! Result packaging into a single zip archive per job.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use sticker_models::{FileResult, JobId};

use crate::error::{WorkerError, WorkerResult};

/// Archive file name for a job.
pub fn archive_name(job_id: &JobId) -> String {
    format!("telegram_stickers_{}.zip", job_id)
}

/// Bundle every successful output into `<output_dir>/telegram_stickers_<job>.zip`.
///
/// Entries are named by their processed output name, in submission order.
/// The archive is written to a temp file and renamed into place. Blocking.
pub fn build_archive(
    output_dir: &Path,
    job_id: &JobId,
    files: &[FileResult],
) -> WorkerResult<PathBuf> {
    if files.is_empty() {
        return Err(WorkerError::packaging_failed("No files to package"));
    }

    std::fs::create_dir_all(output_dir)?;
    let archive_path = output_dir.join(archive_name(job_id));

    let mut tmp = tempfile::NamedTempFile::new_in(output_dir)?;
    {
        let mut zip = ZipWriter::new(tmp.as_file_mut());
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for file in files {
            zip.start_file(file.processed.as_str(), options)?;
            let mut source = File::open(&file.path)?;
            io::copy(&mut source, &mut zip)?;
        }

        zip.finish()?;
    }
    tmp.persist(&archive_path)
        .map_err(|e| WorkerError::Io(e.error))?;

    info!(
        job_id = %job_id,
        entries = files.len(),
        archive = %archive_path.display(),
        "Archive created"
    );

    Ok(archive_path)
}

/// Async wrapper running [`build_archive`] on the blocking pool.
pub async fn package(
    output_dir: PathBuf,
    job_id: JobId,
    files: Vec<FileResult>,
) -> WorkerResult<PathBuf> {
    tokio::task::spawn_blocking(move || build_archive(&output_dir, &job_id, &files))
        .await
        .map_err(|e| WorkerError::packaging_failed(format!("Archive task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn output(dir: &Path, name: &str, body: &[u8]) -> FileResult {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        FileResult {
            file_id: name.to_string(),
            original: format!("src_{}", name),
            processed: name.to_string(),
            path,
            size: body.len() as u64,
        }
    }

    #[test]
    fn test_archive_contains_exactly_the_results() {
        let dir = TempDir::new().unwrap();
        let job_id = JobId::from_string("abc");
        let files = vec![
            output(dir.path(), "sticker_1.webp", b"one"),
            output(dir.path(), "sticker_3.webm", b"three"),
        ];

        let path = build_archive(dir.path(), &job_id, &files).unwrap();
        assert_eq!(path, dir.path().join("telegram_stickers_abc.zip"));

        let mut archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);

        let mut body = String::new();
        archive
            .by_name("sticker_3.webm")
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "three");
        assert!(archive.by_name("sticker_1.webp").is_ok());
    }

    #[test]
    fn test_empty_results_are_rejected() {
        let dir = TempDir::new().unwrap();
        let err = build_archive(dir.path(), &JobId::from_string("x"), &[]).unwrap_err();
        assert!(matches!(err, WorkerError::PackagingFailed(_)));
        assert!(!dir.path().join("telegram_stickers_x.zip").exists());
    }

    #[tokio::test]
    async fn test_missing_output_fails_without_archive() {
        let dir = TempDir::new().unwrap();
        let mut file = output(dir.path(), "sticker_1.webp", b"one");
        file.path = dir.path().join("vanished.webp");

        let err = package(dir.path().to_path_buf(), JobId::from_string("y"), vec![file])
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Io(_)));
        assert!(!dir.path().join("telegram_stickers_y.zip").exists());
    }
}
