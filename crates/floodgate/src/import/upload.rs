//! Streams local files into a blob sink.

use futures::StreamExt;
use futures::stream;
use snafu::prelude::*;
use tokio::io::AsyncReadExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use floodgate_core::error::ConfigError;
use floodgate_core::{BlobSink, BlobWriter};

use crate::config::FileSpec;
use crate::error::{CancelledSnafu, ImportError, ReadSourceSnafu, StalledWriteSnafu, UploadSnafu};

/// Upload `files`, at most `max_concurrent` at a time.
///
/// The first failure stops the batch: uploads still in flight are cancelled
/// and their blobs aborted, and that first error is returned. On success
/// returns the total number of bytes written.
pub(crate) async fn upload_files(
    sink: &dyn BlobSink,
    files: &[FileSpec],
    chunk_size: usize,
    max_concurrent: usize,
    cancel: &CancellationToken,
) -> Result<u64, ImportError> {
    let batch = cancel.child_token();
    let uploads = files
        .iter()
        .map(|file| upload_file(sink, file, chunk_size, &batch));
    let mut uploads = stream::iter(uploads).buffer_unordered(max_concurrent.max(1));

    let mut total = 0;
    let mut first_error = None;
    while let Some(result) = uploads.next().await {
        match result {
            Ok(bytes) => total += bytes,
            Err(err) if first_error.is_none() => {
                batch.cancel();
                first_error = Some(err);
            }
            Err(err) => debug!(error = %err, "Upload stopped after batch failure"),
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(total),
    }
}

async fn upload_file(
    sink: &dyn BlobSink,
    file: &FileSpec,
    chunk_size: usize,
    cancel: &CancellationToken,
) -> Result<u64, ImportError> {
    let Some(name) = file.blob_name() else {
        return Err(ImportError::Config {
            source: ConfigError::Invalid {
                message: format!("cannot derive a blob name from {}", file.source.display()),
            },
        });
    };
    ensure!(!cancel.is_cancelled(), CancelledSnafu);

    let start = Instant::now();
    let mut source = tokio::fs::File::open(&file.source)
        .await
        .context(ReadSourceSnafu { path: &file.source })?;

    let mut writer = sink
        .create(&name)
        .await
        .context(UploadSnafu { name: &name })?;

    let total = match copy(&mut source, writer.as_mut(), file, &name, chunk_size, cancel).await {
        Ok(total) => total,
        Err(err) => {
            if let Err(abort_err) = writer.abort().await {
                warn!(blob = %name, error = %abort_err, "Failed to abort blob");
            }
            return Err(err);
        }
    };

    writer.close().await.context(UploadSnafu { name: &name })?;

    info!(
        blob = %name,
        source = %file.source.display(),
        bytes = total,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Uploaded file"
    );
    Ok(total)
}

async fn copy(
    source: &mut tokio::fs::File,
    writer: &mut dyn BlobWriter,
    file: &FileSpec,
    name: &str,
    chunk_size: usize,
    cancel: &CancellationToken,
) -> Result<u64, ImportError> {
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total = 0u64;

    loop {
        ensure!(!cancel.is_cancelled(), CancelledSnafu);

        let n = source
            .read(&mut buf)
            .await
            .context(ReadSourceSnafu { path: &file.source })?;
        if n == 0 {
            return Ok(total);
        }

        // The sink may accept only part of a chunk; keep going until it is consumed.
        let mut offset = 0;
        while offset < n {
            let accepted = writer
                .write(cancel, &buf[offset..n])
                .await
                .context(UploadSnafu { name })?;
            ensure!(accepted > 0, StalledWriteSnafu { name });
            offset += accepted;
        }
        total += n as u64;
        debug!(blob = %name, bytes = total, "Uploaded chunk");
    }
}
