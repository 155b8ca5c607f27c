// src/graph/virtual_matches.rs
//! Virtual matches for scan-id modules
//!
//! A template module can depend on adaptive files without importing them
//! (for example a compiled template reading sibling assets). Such a module
//! lists those files as scan ids and hands over its source code. It becomes
//! adaptive itself: one virtual alternate per distinct non-empty flag set
//! found among the scanned files' alternates, each alternate being the same
//! source loaded again under that flag set.

use super::orchestrator::GraphWalker;
use super::ResolvedModule;
use crate::error::{Error, Result};
use crate::file_types::is_builtin_module_type;
use crate::flags::FlagSet;
use crate::matcher::{Match, Matches};
use crate::module_ref::ModuleRef;
use futures::future::{BoxFuture, FutureExt, try_join_all};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

impl GraphWalker<'_> {
    /// Matches for a resolved module: on-disk variants first, then virtual
    /// matches derived from its scan ids
    pub async fn virtual_matches(&self, resolved: &ResolvedModule) -> Result<Option<Arc<Matches>>> {
        self.virtual_matches_inner(resolved.id.clone(), Vec::new()).await
    }

    fn virtual_matches_inner(
        &self,
        id: String,
        stack: Vec<String>,
    ) -> BoxFuture<'_, Result<Option<Arc<Matches>>>> {
        async move {
            if Path::new(&id).is_absolute()
                && let Some(matches) = self.matcher.get_matches(&id)?
            {
                return Ok(Some(matches));
            }

            if is_builtin_module_type(&id) || stack.contains(&id) {
                return Ok(None);
            }

            let Some(loaded) = self.host.load(&id).await? else {
                return Ok(None);
            };
            let Some(scan_ids) = loaded.scan_ids else {
                return Ok(None);
            };
            let Some(source_code) = loaded.source_code else {
                return Err(Error::MissingSource(id));
            };

            let mut stack = stack;
            stack.push(id.clone());
            let scanned = try_join_all(
                scan_ids
                    .into_iter()
                    .map(|scan_id| self.virtual_matches_inner(scan_id, stack.clone())),
            )
            .await?;

            let mut flag_sets: Vec<FlagSet> = scanned
                .iter()
                .flatten()
                .flat_map(|matches| matches.alternates.iter().map(|m| m.flags.clone()))
                .filter(|flags| !flags.is_empty())
                .collect();
            flag_sets.sort();
            flag_sets.dedup();

            if flag_sets.is_empty() {
                return Ok(None);
            }

            let aid = self.registry.adaptive_id(&id);
            let alternates = flag_sets
                .into_iter()
                .map(|flags| {
                    let value = self.registry.host_id(&ModuleRef::VirtualMatch(aid, flags.clone()));
                    Match { flags, value }
                })
                .collect::<Vec<_>>();

            debug!("{} has {} virtual match(es)", id, alternates.len());
            self.state.record_virtual_source(aid, source_code);

            let matches = Arc::new(Matches {
                default: id,
                alternates,
            });
            self.state.record_matches(aid, matches.clone());
            Ok(Some(matches))
        }
        .boxed()
    }
}
