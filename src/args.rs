use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// injective - 分层依赖注入的名称解析工具
#[derive(Parser, Debug)]
#[command(name = "injective", version)]
#[command(about = "Resolve logical module names through aliases, bundles and layered contexts")]
pub struct Args {
    /// 子命令
    #[command(subcommand)]
    pub command: Command,

    /// 配置文件（.toml 或 .json）；缺省时在当前目录查找 injective.toml / injective.json
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// 覆盖配置中的 base_path
    #[arg(long, global = true)]
    pub base_path: Option<PathBuf>,

    /// 裸库标识的查找目录，可重复
    #[arg(long = "lib", global = true)]
    pub library_dirs: Vec<PathBuf>,

    /// 提高日志级别（-v info，-vv debug，-vvv trace）
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 解析并加载名称，输出 JSON 结果
    Resolve {
        /// 逻辑名称；缺省为配置中的 main
        names: Vec<String>,
        /// 输出紧凑 JSON
        #[arg(long)]
        compact: bool,
    },
    /// 只解析规范位置，不加载
    Locate {
        /// 逻辑名称
        #[arg(required = true)]
        names: Vec<String>,
    },
}
