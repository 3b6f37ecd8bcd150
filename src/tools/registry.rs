//! Compile-time registry of native tool classes.

use crate::tools::fs::{
    CreateDirectoryTool, CreateFileTool, DeleteDirectoryTool, DeleteFileTool, ListDirectoryTool,
    MoveItemTool, ReadFileTool,
};
use crate::tools::types::ToolClass;

/// Ordered set of native tool classes.
pub struct NativeRegistry {
    classes: Vec<Box<dyn ToolClass>>,
}

impl NativeRegistry {
    /// Every built-in class, with file tools rooted at `workspace_root` by default.
    pub fn builtin(workspace_root: &str) -> Self {
        let classes: Vec<Box<dyn ToolClass>> = vec![
            // Filesystem tools
            Box::new(CreateFileTool::new(workspace_root)),
            Box::new(ReadFileTool::new(workspace_root)),
            Box::new(ListDirectoryTool::new(workspace_root)),
            Box::new(DeleteFileTool::new(workspace_root)),
            Box::new(CreateDirectoryTool::new(workspace_root)),
            Box::new(DeleteDirectoryTool::new(workspace_root)),
            Box::new(MoveItemTool::new(workspace_root)),
        ];
        Self { classes }
    }

    pub fn classes(&self) -> impl Iterator<Item = &dyn ToolClass> {
        self.classes.iter().map(|class| class.as_ref())
    }

    /// First class whose tool name matches.
    pub fn find(&self, name: &str) -> Option<&dyn ToolClass> {
        self.classes().find(|class| class.name() == name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
