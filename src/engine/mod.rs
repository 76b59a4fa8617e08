// ==========================================
// EKAP 招标数据采集系统 - 采集引擎层
// ==========================================
// 职责: 会话驱动、列表定位、详情抽取、验证门、重试、阶段编排
// 红线: 只依赖 PortalSurface 交互能力, 不依赖具体浏览器协议
//       记录级错误必须带原因记录日志
// ==========================================

pub mod discovery;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod layout;
pub mod locator;
pub mod orchestrator;
pub mod retry;
pub mod session;
pub mod surface;
pub mod verification;

// 重导出核心类型
pub use discovery::{EntryCollector, ListingDiscovery};
pub use error::{AcquisitionError, AcquisitionResult};
pub use extractor::{DetailExtractor, Extraction, SectionOutcome, SectionReport};
pub use fetcher::{BrowserDetailFetcher, FetchReport, SkippedRecord};
pub use layout::{ChallengeLayout, NoticeLayout, PortalLayout, SectionLayout};
pub use locator::{ListLocator, Located};
pub use orchestrator::{
    DetailPhase, DiscoveryPhase, PhaseReport, PhaseStatus, PipelineOrchestrator, RunSummary,
};
pub use retry::RetryPolicy;
pub use session::{DetailView, SessionDriver};
pub use surface::{
    ElementRef, OptionChoice, PairQuery, PortalSurface, Scope, Settle, SurfaceError,
    SurfaceResult,
};
pub use verification::{
    CaptchaSolver, GateOutcome, OperatorChannel, OperatorHandle, SolverError, VerificationGate,
    VerificationPrompt,
};
