//! File materialization: the ordered byte stream of a file node.
//!
//! Chunks are the file's `content` blobs, delivered strictly in recorded
//! order while up to a small window of fetches runs ahead. Dropping the
//! stream cancels the producer at the next chunk boundary; a size
//! mismatch is reported after every byte has been delivered.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use tokio::sync::mpsc;

use icevault_core::{BlobType, Id, Node, NodeType, VaultError, VaultResult};

use crate::index::BlobIndex;
use crate::pack::PackReader;

/// How many content blobs may be fetched ahead of consumption.
pub const PREFETCH_WINDOW: usize = 4;

/// An in-order stream of a file's chunks.
pub struct FileStream {
    rx: mpsc::Receiver<VaultResult<Bytes>>,
}

impl std::fmt::Debug for FileStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStream").finish_non_exhaustive()
    }
}

impl FileStream {
    /// The next chunk, or `None` once the file is exhausted.
    pub async fn next_chunk(&mut self) -> Option<VaultResult<Bytes>> {
        self.rx.recv().await
    }

    /// Collect the whole file into one buffer.
    pub async fn read_to_vec(mut self) -> VaultResult<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = self.next_chunk().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }
}

impl Stream for FileStream {
    type Item = VaultResult<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Start streaming a file node's content.
///
/// Fails immediately for non-file nodes; everything later (lookup
/// failures, transport, authentication) arrives through the stream so
/// bytes already fetched are not lost.
pub fn stream_file(
    index: Arc<BlobIndex>,
    packs: Arc<PackReader>,
    node: &Node,
) -> VaultResult<FileStream> {
    if node.node_type != NodeType::File {
        return Err(VaultError::NotAFile(node.name.clone()));
    }

    let content: Vec<Id> = node.content().to_vec();
    let expected_size = node.size;
    let (tx, rx) = mpsc::channel(PREFETCH_WINDOW);

    tokio::spawn(async move {
        let mut delivered: u64 = 0;

        let mut chunks = stream::iter(content.into_iter().map(|id| {
            let index = Arc::clone(&index);
            let packs = Arc::clone(&packs);
            async move {
                let location = index.find(&id, BlobType::Data)?;
                packs.read_blob(id, location).await
            }
        }))
        .buffered(PREFETCH_WINDOW);

        while let Some(result) = chunks.next().await {
            match result {
                Ok(bytes) => {
                    delivered += bytes.len() as u64;
                    if tx.send(Ok(bytes)).await.is_err() {
                        // Receiver gone: the caller cancelled.
                        return;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            }
        }

        if let Some(expected) = expected_size {
            if expected != delivered {
                let _ = tx
                    .send(Err(VaultError::SizeMismatch {
                        expected,
                        actual: delivered,
                    }))
                    .await;
            }
        }
    });

    Ok(FileStream { rx })
}
