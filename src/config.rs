use crate::error::ChatError;
use crate::transport::DEFAULT_OUTBOX_CAPACITY;

/// Relay configuration. Built with `ServerConfig::builder()`, or from the
/// environment with `ServerConfig::from_env()`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    pub port: u16,
    /// Name attached to welcome, join and leave notices.
    pub admin_name: String,
    pub welcome: String,
    /// Extra words rejected on top of the profanity filter.
    pub blocked_words: Vec<String>,
    /// Per-connection queue length; events past it are dropped.
    pub outbox_capacity: usize,
}

pub struct ServerConfigBuilder {
    addr: String,
    port: u16,
    admin_name: String,
    welcome: String,
    blocked_words: Vec<String>,
    outbox_capacity: usize,
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            addr: "127.0.0.1".to_string(),
            port: 3000,
            admin_name: "Admin".to_string(),
            welcome: "Welcome To Idan's Chat!".to_string(),
            blocked_words: Vec::new(),
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
        }
    }

    /// Defaults overlaid with `PORT`, `CHAT_ADDR`, `CHAT_ADMIN`,
    /// `CHAT_WELCOME`, `CHAT_BLOCKED_WORDS` (comma separated) and
    /// `CHAT_OUTBOX_CAPACITY`.
    pub fn from_env() -> Result<Self, ChatError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ChatError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();

        if let Some(port) = lookup("PORT") {
            let port = port
                .trim()
                .parse::<u16>()
                .map_err(|e| ChatError::Config(format!("invalid PORT {port:?}: {e}")))?;
            builder = builder.port(port);
        }
        if let Some(addr) = lookup("CHAT_ADDR") {
            builder = builder.addr(addr.trim());
        }
        if let Some(admin) = lookup("CHAT_ADMIN") {
            builder = builder.admin_name(admin.trim());
        }
        if let Some(welcome) = lookup("CHAT_WELCOME") {
            builder = builder.welcome(welcome);
        }
        if let Some(words) = lookup("CHAT_BLOCKED_WORDS") {
            builder = builder.blocked_words(words.split(',').map(str::trim).filter(|w| !w.is_empty()));
        }
        if let Some(capacity) = lookup("CHAT_OUTBOX_CAPACITY") {
            let capacity = capacity.trim().parse::<usize>().map_err(|e| {
                ChatError::Config(format!("invalid CHAT_OUTBOX_CAPACITY {capacity:?}: {e}"))
            })?;
            builder = builder.outbox_capacity(capacity);
        }

        Ok(builder.build())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }
}

impl ServerConfigBuilder {
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn admin_name(mut self, name: impl Into<String>) -> Self {
        self.admin_name = name.into();
        self
    }

    pub fn welcome(mut self, welcome: impl Into<String>) -> Self {
        self.welcome = welcome.into();
        self
    }

    pub fn blocked_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blocked_words.extend(words.into_iter().map(Into::into));
        self
    }

    pub fn outbox_capacity(mut self, capacity: usize) -> Self {
        self.outbox_capacity = capacity;
        self
    }

    pub fn build(self) -> ServerConfig {
        ServerConfig {
            addr: self.addr,
            port: self.port,
            admin_name: self.admin_name,
            welcome: self.welcome,
            blocked_words: self.blocked_words,
            outbox_capacity: self.outbox_capacity,
        }
    }
}
