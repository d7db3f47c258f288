//! 名称到规范位置的解析
//!
//! 依次应用：相对引用、bundle 展开、最长前缀别名替换、根相对改写，
//! 最后交给加载器自身的解析规则。

use super::loader::ModuleLoader;
use super::paths;
use crate::config::InjectiveConfig;
use crate::errors::InjectError;

/// 解析得到的规范位置，bundle 会展开为有序列表
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Single(String),
    Bundle(Vec<Location>),
}

impl Location {
    /// 按声明顺序展开为扁平列表
    pub fn flatten(&self) -> Vec<&str> {
        match self {
            Location::Single(location) => vec![location.as_str()],
            Location::Bundle(members) => members.iter().flat_map(Location::flatten).collect(),
        }
    }
}

/// 一次展开的结果：bundle 成员名，或待加载器解析的符号名
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target<'a> {
    Bundle(&'a [String]),
    Symbolic(String),
}

pub struct PathResolver {
    config: InjectiveConfig,
}

impl PathResolver {
    pub fn new(config: InjectiveConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InjectiveConfig {
        &self.config
    }

    /// 单步展开，不访问加载器
    pub fn expand<'a>(&'a self, name: &str) -> Target<'a> {
        if paths::is_relative(name) {
            return Target::Symbolic(name.to_string());
        }

        if let Some(members) = self.config.bundles.get(name) {
            return Target::Bundle(members);
        }

        let substituted = self.substitute(name);
        let substituted = match self.config.base_path.as_deref() {
            Some(base) if paths::is_rooted(&substituted) || paths::is_relative(&substituted) => {
                paths::join(base, &substituted)
            }
            _ => substituted,
        };
        Target::Symbolic(substituted)
    }

    /// 最长 `/` 段前缀匹配，只替换一次
    fn substitute(&self, name: &str) -> String {
        if self.config.paths.is_empty() {
            return name.to_string();
        }

        let segments: Vec<&str> = name.split('/').collect();
        for len in (1..=segments.len()).rev() {
            let prefix = segments[..len].join("/");
            if let Some(real) = self.config.paths.get(&prefix) {
                let rest = &segments[len..];
                return if rest.is_empty() {
                    real.clone()
                } else {
                    format!("{}/{}", real.trim_end_matches('/'), rest.join("/"))
                };
            }
        }
        name.to_string()
    }

    /// 把符号名交给加载器，失败时保留原始名称
    pub fn canonicalize(
        &self,
        name: &str,
        symbolic: &str,
        origin: &str,
        loader: &dyn ModuleLoader,
    ) -> Result<String, InjectError> {
        loader
            .resolve_canonical(symbolic, origin)
            .map_err(|cause| InjectError::Resolution {
                name: name.to_string(),
                cause,
            })
    }

    /// 完整解析：bundle 成员逐个递归解析
    pub fn resolve(
        &self,
        name: &str,
        origin: &str,
        loader: &dyn ModuleLoader,
    ) -> Result<Location, InjectError> {
        let mut visiting = Vec::new();
        self.resolve_inner(name, origin, loader, &mut visiting)
    }

    fn resolve_inner(
        &self,
        name: &str,
        origin: &str,
        loader: &dyn ModuleLoader,
        visiting: &mut Vec<String>,
    ) -> Result<Location, InjectError> {
        match self.expand(name) {
            Target::Symbolic(symbolic) => self
                .canonicalize(name, &symbolic, origin, loader)
                .map(Location::Single),
            Target::Bundle(members) => {
                if visiting.iter().any(|bundle| bundle == name) {
                    let mut chain = visiting.clone();
                    chain.push(name.to_string());
                    return Err(InjectError::CircularDependency { chain });
                }
                visiting.push(name.to_string());
                let resolved = members
                    .iter()
                    .map(|member| self.resolve_inner(member, origin, loader, visiting))
                    .collect::<Result<Vec<_>, _>>()?;
                visiting.pop();
                Ok(Location::Bundle(resolved))
            }
        }
    }
}
