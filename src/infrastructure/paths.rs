//! 规范位置字符串工具
//!
//! 规范位置是加载器可寻址的 `/` 分隔字符串，与宿主操作系统的路径语义无关，
//! 因此这里不使用 `std::path`。

/// `./x`、`../x`、`.`、`..` 视为相对引用
pub fn is_relative(name: &str) -> bool {
    name == "."
        || name == ".."
        || name.starts_with("./")
        || name.starts_with("../")
}

/// 以 `/` 开头的名称相对于根（或 `base_path`）解析
pub fn is_rooted(name: &str) -> bool {
    name.starts_with('/')
}

/// 折叠 `.`、`..` 与重复的分隔符
///
/// 根路径上的 `..` 被丢弃；非根路径开头多余的 `..` 保留。
pub fn normalize(path: &str) -> String {
    let rooted = is_rooted(path);
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if rooted => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// 把 `path` 拼接到 `base` 之后；`path` 开头的 `/` 不会重置到根
pub fn join(base: &str, path: &str) -> String {
    if base.is_empty() {
        return normalize(path);
    }
    normalize(&format!("{}/{}", base, path.trim_start_matches('/')))
}

/// 位置所在的目录
pub fn dirname(location: &str) -> String {
    let normalized = normalize(location);
    match normalized.rfind('/') {
        Some(0) => "/".to_string(),
        Some(index) => normalized[..index].to_string(),
        None => ".".to_string(),
    }
}
