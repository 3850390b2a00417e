//! Metadata graph provider interface
//!
//! The runtime owns classes, loaders, packages, modules, methods and threads.
//! The type set reads their structural fields through `MetadataGraph`, by
//! value, at call time. Entities handed out by the provider stay valid for
//! the duration of one call.

use rustc_hash::FxHashMap;

use crate::artifact::{ArtifactHandle, ArtifactKind, ArtifactRef, Modifiers};

/// Structural fields of a class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
    /// Binary name, e.g. `java/lang/String`
    pub name: String,
    /// Defining loader; `None` for the bootstrap loader
    pub loader: Option<ArtifactHandle>,
    /// Package; `None` for array and primitive classes
    pub package: Option<ArtifactHandle>,
    /// Superclass
    pub super_class: Option<ArtifactHandle>,
    /// Element class of an array class
    pub element: Option<ArtifactHandle>,
    /// Access flags
    pub modifiers: Modifiers,
    /// Hidden class
    pub hidden: bool,
}

impl ClassInfo {
    /// Plain public class with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            loader: None,
            package: None,
            super_class: None,
            element: None,
            modifiers: Modifiers::from_bits(Modifiers::PUBLIC),
            hidden: false,
        }
    }
}

/// Structural fields of a method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    /// Declaring class
    pub holder: ArtifactHandle,
    /// Method name
    pub name: String,
    /// Method descriptor
    pub descriptor: String,
    /// Access flags
    pub modifiers: Modifiers,
    /// Hidden frame (lambda forms and similar)
    pub hidden: bool,
}

/// Structural fields of a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    /// Package name, `/`-separated
    pub name: String,
    /// Module containing the package
    pub module: Option<ArtifactHandle>,
    /// Exported by its module
    pub exported: bool,
}

/// Structural fields of a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Module name
    pub name: String,
    /// Version string
    pub version: Option<String>,
    /// Location URI
    pub location: Option<String>,
}

/// Structural fields of a class loader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderInfo {
    /// Loader name, if named
    pub name: Option<String>,
    /// Name of the loader's own type
    pub type_name: String,
}

/// Structural fields of a thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    /// Thread name
    pub name: String,
    /// OS thread id
    pub os_thread_id: u64,
    /// Runtime thread id, if attached
    pub managed_thread_id: Option<u64>,
}

/// Fields of any artifact, read by value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactInfo {
    /// Class
    Class(ClassInfo),
    /// Method
    Method(MethodInfo),
    /// Package
    Package(PackageInfo),
    /// Module
    Module(ModuleInfo),
    /// Class loader
    ClassLoader(LoaderInfo),
    /// Thread
    Thread(ThreadInfo),
}

/// Read access to the runtime's metadata graph.
///
/// Every lookup returns `None` for a handle the runtime no longer knows.
pub trait MetadataGraph {
    /// Class fields
    fn class(&self, handle: ArtifactHandle) -> Option<ClassInfo>;

    /// Method fields
    fn method(&self, handle: ArtifactHandle) -> Option<MethodInfo>;

    /// Package fields
    fn package(&self, handle: ArtifactHandle) -> Option<PackageInfo>;

    /// Module fields
    fn module(&self, handle: ArtifactHandle) -> Option<ModuleInfo>;

    /// Class loader fields
    fn loader(&self, handle: ArtifactHandle) -> Option<LoaderInfo>;

    /// Thread fields
    fn thread(&self, handle: ArtifactHandle) -> Option<ThreadInfo>;

    /// Classes the current unloading safepoint is about to reclaim
    fn unloading_classes(&self) -> Vec<ArtifactHandle>;

    /// Fields of any non-symbol artifact
    fn describe(&self, artifact: ArtifactRef) -> Option<ArtifactInfo> {
        let handle = artifact.handle;
        match artifact.kind {
            ArtifactKind::Symbol => None,
            ArtifactKind::ClassLoader => self.loader(handle).map(ArtifactInfo::ClassLoader),
            ArtifactKind::Module => self.module(handle).map(ArtifactInfo::Module),
            ArtifactKind::Package => self.package(handle).map(ArtifactInfo::Package),
            ArtifactKind::Class => self.class(handle).map(ArtifactInfo::Class),
            ArtifactKind::Method => self.method(handle).map(ArtifactInfo::Method),
            ArtifactKind::Thread => self.thread(handle).map(ArtifactInfo::Thread),
        }
    }

    /// Whether the class is part of the current unloading pass
    fn is_unloading(&self, handle: ArtifactHandle) -> bool {
        self.unloading_classes().contains(&handle)
    }
}

/// Heap-backed metadata graph.
///
/// Used by embedders that mirror runtime metadata into plain tables, and by
/// tests. Handles are spaced like aligned addresses.
#[derive(Debug, Default)]
pub struct InMemoryGraph {
    next_handle: u64,
    classes: FxHashMap<ArtifactHandle, ClassInfo>,
    methods: FxHashMap<ArtifactHandle, MethodInfo>,
    packages: FxHashMap<ArtifactHandle, PackageInfo>,
    modules: FxHashMap<ArtifactHandle, ModuleInfo>,
    loaders: FxHashMap<ArtifactHandle, LoaderInfo>,
    threads: FxHashMap<ArtifactHandle, ThreadInfo>,
    unloading: Vec<ArtifactHandle>,
}

impl InMemoryGraph {
    const HANDLE_BASE: u64 = 0x1000;
    const HANDLE_STRIDE: u64 = 0x10;

    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> ArtifactHandle {
        let handle = ArtifactHandle::new(Self::HANDLE_BASE + self.next_handle * Self::HANDLE_STRIDE);
        self.next_handle += 1;
        handle
    }

    /// Add a module
    pub fn add_module(&mut self, info: ModuleInfo) -> ArtifactHandle {
        let handle = self.next();
        self.modules.insert(handle, info);
        handle
    }

    /// Add a named module without version or location
    pub fn add_named_module(&mut self, name: &str) -> ArtifactHandle {
        self.add_module(ModuleInfo {
            name: name.to_string(),
            version: None,
            location: None,
        })
    }

    /// Add an exported package
    pub fn add_package(&mut self, name: &str, module: Option<ArtifactHandle>) -> ArtifactHandle {
        let handle = self.next();
        self.packages.insert(
            handle,
            PackageInfo {
                name: name.to_string(),
                module,
                exported: true,
            },
        );
        handle
    }

    /// Add a class loader
    pub fn add_loader(&mut self, name: Option<&str>, type_name: &str) -> ArtifactHandle {
        let handle = self.next();
        self.loaders.insert(
            handle,
            LoaderInfo {
                name: name.map(str::to_string),
                type_name: type_name.to_string(),
            },
        );
        handle
    }

    /// Add a class
    pub fn add_class(&mut self, info: ClassInfo) -> ArtifactHandle {
        let handle = self.next();
        self.classes.insert(handle, info);
        handle
    }

    /// Add a class at a handle of a reclaimed class, as when the runtime
    /// reuses freed metadata memory
    pub fn add_class_at(&mut self, handle: ArtifactHandle, info: ClassInfo) {
        self.classes.insert(handle, info);
    }

    /// Add a method
    pub fn add_method(&mut self, holder: ArtifactHandle, name: &str, descriptor: &str) -> ArtifactHandle {
        let handle = self.next();
        self.methods.insert(
            handle,
            MethodInfo {
                holder,
                name: name.to_string(),
                descriptor: descriptor.to_string(),
                modifiers: Modifiers::from_bits(Modifiers::PUBLIC),
                hidden: false,
            },
        );
        handle
    }

    /// Add a thread
    pub fn add_thread(&mut self, name: &str, os_thread_id: u64) -> ArtifactHandle {
        let handle = self.next();
        self.threads.insert(
            handle,
            ThreadInfo {
                name: name.to_string(),
                os_thread_id,
                managed_thread_id: Some(self.threads.len() as u64 + 1),
            },
        );
        handle
    }

    /// Mutable access to a class's fields
    pub fn class_mut(&mut self, handle: ArtifactHandle) -> Option<&mut ClassInfo> {
        self.classes.get_mut(&handle)
    }

    /// Announce that `classes` are about to be reclaimed
    pub fn begin_unloading(&mut self, classes: &[ArtifactHandle]) {
        self.unloading.extend_from_slice(classes);
    }

    /// Reclaim the classes announced by `begin_unloading`, with their methods.
    ///
    /// Returns how many classes were removed.
    pub fn finish_unloading(&mut self) -> usize {
        let unloading = std::mem::take(&mut self.unloading);
        let mut removed = 0;
        for class in unloading {
            if self.classes.remove(&class).is_some() {
                removed += 1;
            }
            self.methods.retain(|_, m| m.holder != class);
        }
        removed
    }

    /// Leave the unloading safepoint without reclaiming anything
    pub fn cancel_unloading(&mut self) {
        self.unloading.clear();
    }

    /// Remove any entity outright
    pub fn remove(&mut self, artifact: ArtifactRef) -> bool {
        let handle = artifact.handle;
        match artifact.kind {
            ArtifactKind::Symbol => false,
            ArtifactKind::ClassLoader => self.loaders.remove(&handle).is_some(),
            ArtifactKind::Module => self.modules.remove(&handle).is_some(),
            ArtifactKind::Package => self.packages.remove(&handle).is_some(),
            ArtifactKind::Class => self.classes.remove(&handle).is_some(),
            ArtifactKind::Method => self.methods.remove(&handle).is_some(),
            ArtifactKind::Thread => self.threads.remove(&handle).is_some(),
        }
    }
}

impl MetadataGraph for InMemoryGraph {
    fn class(&self, handle: ArtifactHandle) -> Option<ClassInfo> {
        self.classes.get(&handle).cloned()
    }

    fn method(&self, handle: ArtifactHandle) -> Option<MethodInfo> {
        self.methods.get(&handle).cloned()
    }

    fn package(&self, handle: ArtifactHandle) -> Option<PackageInfo> {
        self.packages.get(&handle).cloned()
    }

    fn module(&self, handle: ArtifactHandle) -> Option<ModuleInfo> {
        self.modules.get(&handle).cloned()
    }

    fn loader(&self, handle: ArtifactHandle) -> Option<LoaderInfo> {
        self.loaders.get(&handle).cloned()
    }

    fn thread(&self, handle: ArtifactHandle) -> Option<ThreadInfo> {
        self.threads.get(&handle).cloned()
    }

    fn unloading_classes(&self) -> Vec<ArtifactHandle> {
        self.unloading.clone()
    }

    fn is_unloading(&self, handle: ArtifactHandle) -> bool {
        self.unloading.contains(&handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_distinct_across_kinds() {
        let mut graph = InMemoryGraph::new();
        let m = graph.add_named_module("java.base");
        let p = graph.add_package("java/lang", Some(m));
        assert_ne!(m, p);
        assert!(graph.describe(ArtifactRef::module(m)).is_some());
        assert!(graph.describe(ArtifactRef::module(p)).is_none());
    }

    #[test]
    fn test_unloading_removes_class_and_methods() {
        let mut graph = InMemoryGraph::new();
        let c = graph.add_class(ClassInfo::new("Foo"));
        let m = graph.add_method(c, "run", "()V");
        graph.begin_unloading(&[c]);
        assert!(graph.is_unloading(c));
        assert!(graph.class(c).is_some());
        assert_eq!(graph.finish_unloading(), 1);
        assert!(graph.class(c).is_none());
        assert!(graph.method(m).is_none());
        assert!(graph.unloading_classes().is_empty());
    }
}
