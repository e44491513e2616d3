//! Handler invocation support.
//!
//! An [`ExecBinding`] is what an `executes` clause compiles to: the bound
//! handler plus a snapshot of the mapper table visible at that node. The
//! dispatcher hands it the parsed argument values of one dispatch; the
//! binding applies the mappers, builds the [`Invocation`], and runs the
//! handler. All per-invocation state is allocated here, fresh every call.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use cmdtree_types::{
    ArgValue, ArgumentValue, CommandExecutor, ExecutionSource, Invocation, InvokeError,
};

use crate::context::MapperTable;

/// A node's compiled execution handler with its mapper snapshot.
pub struct ExecBinding {
    handler: Arc<dyn CommandExecutor>,
    mappers: MapperTable,
}

impl ExecBinding {
    pub(crate) fn new(handler: Arc<dyn CommandExecutor>, mappers: MapperTable) -> Self {
        Self { handler, mappers }
    }

    pub fn handler(&self) -> &Arc<dyn CommandExecutor> {
        &self.handler
    }

    /// The mapper table captured when this binding was compiled. Keys are
    /// argument names; values apply in declaration order.
    pub fn mappers(&self) -> &MapperTable {
        &self.mappers
    }

    /// Run the handler for one dispatch. `args` are the parsed argument
    /// values on the matched path, keyed by argument name. Mappers chain:
    /// each receives the previous mapped value, and every produced value
    /// is retained so parameters can pick the kind they declare.
    pub fn invoke(
        &self,
        source: Arc<dyn ExecutionSource>,
        args: Vec<(String, ArgValue)>,
    ) -> Result<i32, InvokeError> {
        let mut table = HashMap::new();
        for (name, parsed) in args {
            let mut value = ArgumentValue::new(parsed);
            if let Some(mappers) = self.mappers.get(&name) {
                for mapper in mappers {
                    let input = value
                        .mapped
                        .last()
                        .cloned()
                        .unwrap_or_else(|| value.parsed.clone());
                    value.mapped.push(mapper.map(input, source.as_ref())?);
                }
            }
            table.insert(name, value);
        }
        let invocation = Invocation::new(source, table);
        let status = self.handler.execute(&invocation)?;
        debug!(status, "handler returned");
        Ok(status)
    }
}
