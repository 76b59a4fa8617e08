// ==========================================
// EKAP 招标数据采集系统 - 阶段产物仓储
// ==========================================
// 职责: 读写每个阶段的持久化产物（检查点）
// 存储: <dataDir>/discovery.json, raw-details.json, cleaned.json,
//       filtered.json, exports/manifest.json
// 红线: 先写临时文件再改名, 写了一半的文件不能被当作检查点
//       快照文件 raw-details.partial.json 不是检查点
// ==========================================

use crate::domain::PhaseKind;
use crate::repository::error::{RepositoryError, RepositoryResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 详情阶段的进度快照文件
pub const SNAPSHOT_FILE: &str = "raw-details.partial.json";

/// 导出目录
pub const EXPORTS_DIR: &str = "exports";

// ==========================================
// PhaseArtifact - 阶段产物
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseArtifact {
    Discovery,
    RawDetails,
    Cleaned,
    Filtered,
    ExportManifest,
}

impl PhaseArtifact {
    /// 相对数据目录的路径
    pub fn relative_path(&self) -> &'static str {
        match self {
            PhaseArtifact::Discovery => "discovery.json",
            PhaseArtifact::RawDetails => "raw-details.json",
            PhaseArtifact::Cleaned => "cleaned.json",
            PhaseArtifact::Filtered => "filtered.json",
            PhaseArtifact::ExportManifest => "exports/manifest.json",
        }
    }

    /// 阶段 → 产物
    pub fn for_phase(phase: PhaseKind) -> Self {
        match phase {
            PhaseKind::Discover => PhaseArtifact::Discovery,
            PhaseKind::FetchDetails => PhaseArtifact::RawDetails,
            PhaseKind::Clean => PhaseArtifact::Cleaned,
            PhaseKind::Filter => PhaseArtifact::Filtered,
            PhaseKind::Export => PhaseArtifact::ExportManifest,
        }
    }
}

// ==========================================
// ArtifactStore - 产物仓储
// ==========================================
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, artifact: PhaseArtifact) -> PathBuf {
        self.root.join(artifact.relative_path())
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.root.join(SNAPSHOT_FILE)
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.root.join(EXPORTS_DIR)
    }

    /// 检查点是否存在
    pub fn exists(&self, artifact: PhaseArtifact) -> bool {
        self.path(artifact).is_file()
    }

    /// 读取阶段产物
    ///
    /// # 返回
    /// - Err(NotFound): 文件不存在
    /// - Err(Corrupted): 文件存在但无法解析
    pub fn load<T: DeserializeOwned>(&self, artifact: PhaseArtifact) -> RepositoryResult<T> {
        let path = self.path(artifact);
        if !path.is_file() {
            return Err(RepositoryError::NotFound(path.display().to_string()));
        }
        let raw = fs::read_to_string(&path).map_err(|e| RepositoryError::io(&path, e))?;
        let value = serde_json::from_str(&raw).map_err(|e| RepositoryError::Corrupted {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        debug!(path = %path.display(), "读取阶段产物");
        Ok(value)
    }

    /// 写入阶段产物
    pub fn save<T: Serialize>(&self, artifact: PhaseArtifact, value: &T) -> RepositoryResult<PathBuf> {
        let path = self.path(artifact);
        write_json_atomic(&path, value)?;
        info!(path = %path.display(), "阶段产物已写入");
        Ok(path)
    }

    /// 写入进度快照
    pub fn save_snapshot<T: Serialize>(&self, value: &T) -> RepositoryResult<PathBuf> {
        let path = self.snapshot_path();
        write_json_atomic(&path, value)?;
        debug!(path = %path.display(), "进度快照已写入");
        Ok(path)
    }

    /// 读取进度快照（不存在时返回 None）
    pub fn load_snapshot<T: DeserializeOwned>(&self) -> RepositoryResult<Option<T>> {
        let path = self.snapshot_path();
        if !path.is_file() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path).map_err(|e| RepositoryError::io(&path, e))?;
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| RepositoryError::Corrupted {
                path: path.display().to_string(),
                message: e.to_string(),
            })
    }
}

/// 以 pretty JSON 写入文件: 临时文件 → rename
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> RepositoryResult<()> {
    let body = serde_json::to_vec_pretty(value).map_err(|e| RepositoryError::Serialization {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    write_atomic(path, &body)
}

/// 原子写入: 先写同目录下的临时文件, 再改名到目标路径
pub fn write_atomic(path: &Path, body: &[u8]) -> RepositoryResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| RepositoryError::io(parent, e))?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    fs::write(&tmp, body).map_err(|e| RepositoryError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| RepositoryError::io(path, e))?;
    Ok(())
}
