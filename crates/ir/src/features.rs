//! Tracks the extensions, capabilities, and external-instruction-set
//! imports a module has enabled.

use indexmap::IndexSet;
use silica_grammar::{Capability, Extension, Grammar};

use crate::{Id, Module};

/// Derived feature state, re-derivable from the module's declarations.
#[derive(Debug, Clone)]
pub struct FeatureManager {
    grammar: &'static Grammar,
    capabilities: IndexSet<Capability>,
    extensions: IndexSet<Extension>,
    import_glsl_std_450: Option<Id>,
    import_opencl_debug_100: Option<Id>,
    import_shader_debug_100: Option<Id>,
}

impl FeatureManager {
    pub fn new(grammar: &'static Grammar) -> Self {
        Self {
            grammar,
            capabilities: IndexSet::new(),
            extensions: IndexSet::new(),
            import_glsl_std_450: None,
            import_opencl_debug_100: None,
            import_shader_debug_100: None,
        }
    }

    /// Scans the module's declarations once and populates all three views.
    pub fn analyze(&mut self, module: &Module) {
        self.add_extensions(module);
        self.add_capabilities(module);
        self.add_ext_inst_import_ids(module);
    }

    fn add_extensions(&mut self, module: &Module) {
        for name in module.extension_names() {
            if let Some(ext) = Extension::from_name(name) {
                self.extensions.insert(ext);
            }
        }
    }

    fn add_capabilities(&mut self, module: &Module) {
        for value in module.capability_values() {
            if let Some(cap) = Capability::from_value(value) {
                self.add_capability(cap);
            }
        }
    }

    fn add_ext_inst_import_ids(&mut self, module: &Module) {
        self.import_glsl_std_450 = module.ext_inst_import_id("GLSL.std.450");
        self.import_opencl_debug_100 = module.ext_inst_import_id("OpenCL.DebugInfo.100");
        self.import_shader_debug_100 =
            module.ext_inst_import_id("NonSemantic.Shader.DebugInfo.100");
    }

    /// Inserts a capability and, recursively, every capability it implies.
    /// Re-inserting is a no-op, which also terminates implication cycles.
    pub fn add_capability(&mut self, cap: Capability) {
        if self.capabilities.contains(&cap) {
            return;
        }
        self.capabilities.insert(cap);
        for implied in cap.implies() {
            self.add_capability(*implied);
        }
    }

    /// Removes a capability; absent capabilities are a no-op. Implied
    /// capabilities stay, matching the declaration-driven model.
    pub fn remove_capability(&mut self, cap: Capability) {
        self.capabilities.shift_remove(&cap);
    }

    pub fn add_extension(&mut self, ext: Extension) {
        self.extensions.insert(ext);
    }

    /// Removes an extension; absent extensions are a no-op.
    pub fn remove_extension(&mut self, ext: Extension) {
        self.extensions.shift_remove(&ext);
    }

    pub fn has_capability(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }

    pub fn has_extension(&self, ext: Extension) -> bool {
        self.extensions.contains(&ext)
    }

    pub fn capabilities(&self) -> impl Iterator<Item = Capability> + '_ {
        self.capabilities.iter().copied()
    }

    pub fn extensions(&self) -> impl Iterator<Item = Extension> + '_ {
        self.extensions.iter().copied()
    }

    pub fn grammar(&self) -> &'static Grammar {
        self.grammar
    }

    pub fn import_glsl_std_450(&self) -> Option<Id> {
        self.import_glsl_std_450
    }

    pub fn import_opencl_debug_100(&self) -> Option<Id> {
        self.import_opencl_debug_100
    }

    pub fn import_shader_debug_100(&self) -> Option<Id> {
        self.import_shader_debug_100
    }
}

impl PartialEq for FeatureManager {
    fn eq(&self, other: &Self) -> bool {
        // Grammar identity first: managers over different grammars are never
        // equal, even with identical visible sets.
        std::ptr::eq(self.grammar, other.grammar)
            && self.capabilities == other.capabilities
            && self.extensions == other.extensions
            && self.import_glsl_std_450 == other.import_glsl_std_450
            && self.import_opencl_debug_100 == other.import_opencl_debug_100
            && self.import_shader_debug_100 == other.import_shader_debug_100
    }
}

impl Eq for FeatureManager {}

#[cfg(test)]
mod tests {
    use super::*;
    use silica_env::TargetEnv;

    fn manager() -> FeatureManager {
        FeatureManager::new(Grammar::global(TargetEnv::Universal1_3))
    }

    #[test]
    fn capability_closure_is_transitive() {
        let mut features = manager();
        features.add_capability(Capability::Geometry);
        assert!(features.has_capability(Capability::Geometry));
        assert!(features.has_capability(Capability::Shader));
        assert!(features.has_capability(Capability::Matrix));
    }

    #[test]
    fn add_capability_is_idempotent() {
        let mut features = manager();
        features.add_capability(Capability::Geometry);
        let snapshot: Vec<_> = features.capabilities().collect();
        features.add_capability(Capability::Geometry);
        assert_eq!(features.capabilities().collect::<Vec<_>>(), snapshot);
    }

    #[test]
    fn remove_is_idempotent_on_absent_entries() {
        let mut features = manager();
        features.remove_capability(Capability::Float64);
        features.remove_extension(Extension::Khr16BitStorage);
        assert!(!features.has_capability(Capability::Float64));

        features.add_capability(Capability::Float64);
        features.remove_capability(Capability::Float64);
        features.remove_capability(Capability::Float64);
        assert!(!features.has_capability(Capability::Float64));
    }

    #[test]
    fn equality_requires_same_grammar() {
        let a = manager();
        let b = manager();
        assert_eq!(a, b);

        let mut c = FeatureManager::new(Grammar::global(TargetEnv::Vulkan1_1));
        // Same (empty) visible sets, different grammar: never equal.
        assert_ne!(a, c);
        c.add_capability(Capability::Shader);
        assert_ne!(a, c);
    }

    #[test]
    fn equality_compares_visible_sets() {
        let mut a = manager();
        let mut b = manager();
        a.add_capability(Capability::Shader);
        assert_ne!(a, b);
        b.add_capability(Capability::Shader);
        assert_eq!(a, b);
    }
}
