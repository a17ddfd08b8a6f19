//! 多单元管理：工作区、include/import 解析与链接

pub mod linker;
pub mod resolver;
pub mod workspace;

pub use linker::{link, LinkedFunc, LinkedNative, Program, TypeInfo, UnitInfo};
pub use resolver::SourceResolver;
pub use workspace::{Unit, Visibility, Workspace, STDLIB_UNIT};
