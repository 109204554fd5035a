use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub sandbox: SandboxConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub http_server: HttpServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_true")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default)]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "loadpilot_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            console: true,
            file: false,
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum ModelConfig {
    Gemini(GeminiConfig),
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::Gemini(GeminiConfig::default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// Per-request HTTP timeout. Independent of the task wait budget.
    #[serde(default = "default_model_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_model_timeout_ms() -> u64 {
    90_000
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_gemini_base_url(),
            api_key: String::new(),
            model: default_gemini_model(),
            timeout_ms: default_model_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Workers serving text-generation tasks.
    #[serde(default = "default_text_workers")]
    pub text_workers: usize,

    /// Workers serving sandboxed runs. Kept small: each one is a container.
    #[serde(default = "default_sandbox_workers")]
    pub sandbox_workers: usize,

    #[serde(default = "default_scheduler_workers")]
    pub scheduler_workers: usize,

    /// How many times a task is handed to a worker before it is declared lost.
    #[serde(default = "default_max_deliveries")]
    pub max_deliveries: u32,

    #[serde(default = "default_maintenance_interval_secs")]
    pub maintenance_interval_secs: u64,
}

fn default_text_workers() -> usize {
    num_cpus::get().max(2)
}

fn default_sandbox_workers() -> usize {
    2
}

fn default_scheduler_workers() -> usize {
    1
}

fn default_max_deliveries() -> u32 {
    3
}

fn default_maintenance_interval_secs() -> u64 {
    60 * 60
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            text_workers: default_text_workers(),
            sandbox_workers: default_sandbox_workers(),
            scheduler_workers: default_scheduler_workers(),
            max_deliveries: default_max_deliveries(),
            maintenance_interval_secs: default_maintenance_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_wait_secs")]
    pub wait_secs: u64,
}

fn default_max_attempts() -> u32 {
    10
}

fn default_wait_secs() -> u64 {
    60
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            wait_secs: default_wait_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default = "default_docker_bin")]
    pub docker_bin: String,

    #[serde(default = "default_image")]
    pub image: String,

    /// Memory ceiling in docker notation. Applies to every run.
    #[serde(default = "default_memory_limit")]
    pub memory_limit: String,

    #[serde(default = "default_cpu_shares")]
    pub cpu_shares: u32,

    /// Wall-clock deadline enforced by the sandbox itself.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,

    /// Only lines starting with this token make it into the run summary.
    #[serde(default = "default_summary_marker")]
    pub summary_marker: String,

    /// Treat "exit code 0 but no results file" as a failure.
    #[serde(default)]
    pub require_results: bool,

    /// JMeter properties file mounted into every run. Falls back to the
    /// bundled minimal properties when unset.
    #[serde(default)]
    pub properties_file: Option<String>,

    /// Scratch root for per-job staging directories.
    #[serde(default)]
    pub work_dir: Option<String>,

    /// Scratch directories older than this are swept by maintenance.
    #[serde(default = "default_scratch_max_age_secs")]
    pub scratch_max_age_secs: u64,
}

fn default_docker_bin() -> String {
    "docker".to_string()
}

fn default_image() -> String {
    "my-jmeter:5.6.3".to_string()
}

fn default_memory_limit() -> String {
    "1g".to_string()
}

fn default_cpu_shares() -> u32 {
    512
}

fn default_deadline_secs() -> u64 {
    30 * 60
}

fn default_summary_marker() -> String {
    "summary".to_string()
}

fn default_scratch_max_age_secs() -> u64 {
    6 * 60 * 60
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            docker_bin: default_docker_bin(),
            image: default_image(),
            memory_limit: default_memory_limit(),
            cpu_shares: default_cpu_shares(),
            deadline_secs: default_deadline_secs(),
            summary_marker: default_summary_marker(),
            require_results: false,
            properties_file: None,
            work_dir: None,
            scratch_max_age_secs: default_scratch_max_age_secs(),
        }
    }
}

impl SandboxConfig {
    pub fn work_dir(&self) -> std::path::PathBuf {
        match self
            .work_dir
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(dir) => std::path::PathBuf::from(shellexpand::tilde(dir).as_ref()),
            None => std::env::temp_dir().join("loadpilot"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_wait_secs")]
    pub wait_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            wait_secs: default_wait_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory of the filesystem object store.
    #[serde(default = "default_store_root")]
    pub root: String,

    #[serde(default = "default_presign_ttl_secs")]
    pub presign_ttl_secs: u64,
}

fn default_store_root() -> String {
    "~/.loadpilot/store".to_string()
}

fn default_presign_ttl_secs() -> u64 {
    3600
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_store_root(),
            presign_ttl_secs: default_presign_ttl_secs(),
        }
    }
}

impl StoreConfig {
    pub fn root_path(&self) -> std::path::PathBuf {
        std::path::PathBuf::from(shellexpand::tilde(&self.root).as_ref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_host")]
    pub host: String,

    #[serde(default = "default_http_port")]
    pub port: u16,

    /// Allowed CORS origin. Localhost only when unset.
    #[serde(default)]
    pub cors_origin: Option<String>,
}

fn default_http_host() -> String {
    "127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
    8080
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_http_host(),
            port: default_http_port(),
            cors_origin: None,
        }
    }
}
