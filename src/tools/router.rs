//! Name → provider routing built once after initialization.

use std::collections::HashMap;

use tracing::warn;

use super::provider::ToolProvider;
use super::types::ToolDescriptor;

/// Maps tool names to the index of the provider that owns them.
///
/// When two providers advertise the same name, the earlier provider wins.
#[derive(Debug, Clone, Default)]
pub struct ToolRouter {
    routes: HashMap<String, usize>,
    descriptors: Vec<ToolDescriptor>,
}

impl ToolRouter {
    pub fn build(providers: &[Box<dyn ToolProvider>]) -> Self {
        let mut routes: HashMap<String, usize> = HashMap::new();
        let mut descriptors = Vec::new();

        for (index, provider) in providers.iter().enumerate() {
            for tool in provider.tools() {
                if let Some(&owner) = routes.get(&tool.name) {
                    warn!(
                        tool = %tool.name,
                        kept = providers[owner].name(),
                        shadowed = provider.name(),
                        "duplicate tool name; keeping first provider"
                    );
                    continue;
                }
                routes.insert(tool.name.clone(), index);
                descriptors.push(tool.clone());
            }
        }

        Self {
            routes,
            descriptors,
        }
    }

    /// Index of the provider owning `name`.
    pub fn resolve(&self, name: &str) -> Option<usize> {
        self.routes.get(name).copied()
    }

    /// Union of all routable tools, in provider order.
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
