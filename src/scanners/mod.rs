//! Per-language scanners. Each module is independent apart from the
//! JavaScript helpers that TypeScript, PHP and the C-like scanners reuse.

pub mod assembly;
pub mod bash;
pub mod cfamily;
pub mod css;
pub mod html;
pub mod javascript;
pub mod php;
pub mod python;
pub mod rust;
pub mod sql;
pub mod swift;
pub mod typescript;
pub mod xml;
