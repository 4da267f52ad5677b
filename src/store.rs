//! Per-post frame storage. Frames are NDJSON files laid out as
//!   `<data_dir>/comment_frame/<post_id>_comment_frame.jsonl`
//!   `<data_dir>/user_frame/<post_id>_user_frame.jsonl`
//!   `<output_dir>/<post_id>_dataset.jsonl[.zst]`

use crate::config::{FeatureOptions, OutputFormat};
use crate::ndjson::{NdjsonReader, NdjsonWriter};
use crate::records::{CommentRecord, UserRecord};
use crate::table::Table;
use anyhow::{bail, Context, Result};
use regex::Regex;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Row-oriented load/store for one post's frames.
pub trait TableStore {
    fn load_comments(&self, post_id: &str) -> Result<Vec<CommentRecord>>;
    fn load_users(&self, post_id: &str) -> Result<Vec<UserRecord>>;
    fn store_dataset(&self, post_id: &str, table: &Table) -> Result<PathBuf>;
}

#[derive(Clone, Debug)]
pub struct JsonlStore {
    data_dir: PathBuf,
    output_dir: PathBuf,
    format: OutputFormat,
    read_buf: usize,
    write_buf: usize,
}

impl JsonlStore {
    pub fn new(opts: &FeatureOptions) -> Self {
        Self {
            data_dir: opts.data_dir.clone(),
            output_dir: opts.output_dir.clone(),
            format: opts.output_format,
            read_buf: opts.read_buffer_bytes,
            write_buf: opts.write_buffer_bytes,
        }
    }

    pub fn comment_frame_path(&self, post_id: &str) -> PathBuf {
        self.data_dir.join("comment_frame").join(format!("{post_id}_comment_frame.jsonl"))
    }

    pub fn user_frame_path(&self, post_id: &str) -> PathBuf {
        self.data_dir.join("user_frame").join(format!("{post_id}_user_frame.jsonl"))
    }

    pub fn dataset_path(&self, post_id: &str) -> PathBuf {
        let ext = match self.format {
            OutputFormat::Jsonl => "jsonl",
            OutputFormat::Zst => "jsonl.zst",
        };
        self.output_dir.join(format!("{post_id}_dataset.{ext}"))
    }

    /// Read a persisted dataset back as JSON objects.
    pub fn load_dataset(&self, post_id: &str) -> Result<Vec<serde_json::Map<String, Value>>> {
        let path = self.dataset_path(post_id);
        NdjsonReader::open(&path, self.read_buf)
            .with_context(|| format!("open {}", path.display()))?
            .read_all(&path)
    }
}

impl TableStore for JsonlStore {
    fn load_comments(&self, post_id: &str) -> Result<Vec<CommentRecord>> {
        let path = self.comment_frame_path(post_id);
        NdjsonReader::open(&path, self.read_buf)
            .with_context(|| format!("open comment frame {}", path.display()))?
            .read_all(&path)
    }

    fn load_users(&self, post_id: &str) -> Result<Vec<UserRecord>> {
        let path = self.user_frame_path(post_id);
        NdjsonReader::open(&path, self.read_buf)
            .with_context(|| format!("open user frame {}", path.display()))?
            .read_all(&path)
    }

    fn store_dataset(&self, post_id: &str, table: &Table) -> Result<PathBuf> {
        if let Some(c) = table.duplicate_column() {
            bail!("refusing to persist dataset for {post_id}: duplicate column `{c}`");
        }
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("create {}", self.output_dir.display()))?;
        let out = self.dataset_path(post_id);
        let tmp = out.with_extension("part");
        let mut w = NdjsonWriter::create(&tmp, self.write_buf, self.format == OutputFormat::Zst)
            .with_context(|| format!("create {}", tmp.display()))?;
        for obj in table.to_objects() {
            let line = serde_json::to_string(&obj)?;
            w.write_line(&line)?;
        }
        w.finish_atomic(&out)?;
        Ok(out)
    }
}

/// Post ids that have a comment frame under `data_dir`, sorted.
pub fn discover_post_ids(data_dir: &Path) -> Vec<String> {
    let re = Regex::new(r"^(.+)_comment_frame\.jsonl$").unwrap();
    let dir = data_dir.join("comment_frame");
    if !dir.exists() {
        return Vec::new();
    }
    let mut ids: Vec<String> = WalkDir::new(&dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().to_str().and_then(|n| re.captures(n)).map(|c| c[1].to_string()))
        .collect();
    ids.sort();
    ids.dedup();
    ids
}
