use thiserror::Error;

/// 类型擦除的底层错误（工厂、构造器与加载器使用）
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum InjectError {
    #[error("Cannot resolve '{name}': {cause}")]
    Resolution {
        name: String,
        #[source]
        cause: LoaderError,
    },
    #[error("Unknown creation kind '{kind}' defined in '{location}'")]
    UnknownCreationKind { kind: String, location: String },
    #[error("Failed to instantiate '{location}': {source}")]
    Instantiation {
        location: String,
        #[source]
        source: BoxError,
    },
    #[error("Circular dependency detected: {}", chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },
    #[error("Failed to resolve '{dependency}' required by '{dependent}': {source}")]
    Dependency {
        dependent: String,
        dependency: String,
        #[source]
        source: Box<InjectError>,
    },
    #[error("'{name}' is not {expected}")]
    TypeMismatch { name: String, expected: &'static str },
}

impl InjectError {
    pub(crate) fn instantiation(location: &str, source: impl Into<BoxError>) -> Self {
        InjectError::Instantiation {
            location: location.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn type_mismatch(name: impl Into<String>, expected: &'static str) -> Self {
        InjectError::TypeMismatch {
            name: name.into(),
            expected,
        }
    }

    /// 沿依赖链向下，返回最初失败的那个错误
    pub fn root_cause(&self) -> &InjectError {
        let mut current = self;
        while let InjectError::Dependency { source, .. } = current {
            current = source.as_ref();
        }
        current
    }

    /// 失败路径上的名称序列，从最外层的依赖方到最初失败的依赖
    pub fn dependency_chain(&self) -> Vec<&str> {
        let mut chain = Vec::new();
        let mut current = self;
        while let InjectError::Dependency {
            dependent,
            dependency,
            source,
        } = current
        {
            if chain.is_empty() {
                chain.push(dependent.as_str());
            }
            chain.push(dependency.as_str());
            current = source.as_ref();
        }
        chain
    }

    /// 名称无法映射或无法加载（别名、bundle 或路径配置问题）
    pub fn is_resolution(&self) -> bool {
        matches!(self.root_cause(), InjectError::Resolution { .. })
    }

    /// 工厂或构造器本身执行失败
    pub fn is_instantiation(&self) -> bool {
        matches!(self.root_cause(), InjectError::Instantiation { .. })
    }
}

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Cannot find '{name}' from '{origin}'")]
    NotFound { name: String, origin: String },
    #[error("Failed to read '{location}': {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse '{location}': {reason}")]
    Parse { location: String, reason: String },
    #[error("Failed to load '{location}': {source}")]
    Load {
        location: String,
        #[source]
        source: BoxError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read file '{0}': {1}")]
    FileRead(String, #[source] std::io::Error),
    #[error("Failed to parse TOML from file '{0}': {1}")]
    TomlParse(String, #[source] toml::de::Error),
    #[error("Failed to parse JSON from file '{0}': {1}")]
    JsonParse(String, #[source] serde_json::Error),
    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(String),
}
