//! The library code for the `refbook` documentation assembler. A build is a
//! pipeline of distinct phases, each a pure function of the previous phase's
//! output:
//!
//! 1. Discovering content files ([`crate::manifest`])
//! 2. Loading documents from their front-matter ([`crate::loader`])
//! 3. Resolving cross-references between documents ([`crate::reference`])
//! 4. Sequencing the prev/next navigation chains ([`crate::navigation`])
//! 5. Rendering the pages to disk ([`crate::write`])
//!
//! Content problems found along the way (a page without front-matter, a link
//! to a page that doesn't exist, a navigation cycle) don't stop the pipeline.
//! Each phase collects them as [`diagnostics::Diagnostic`]s and carries on,
//! so a single run reports everything wrong with the book.
//!
//! [`build::build_book`] and [`build::check_book`] stitch the phases
//! together.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod config;
pub mod diagnostics;
pub mod document;
mod htmlrenderer;
pub mod loader;
pub mod manifest;
pub mod markdown;
pub mod navigation;
pub mod reference;
pub mod url;
mod value;
pub mod write;
