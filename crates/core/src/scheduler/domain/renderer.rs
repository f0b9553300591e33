use thiserror::Error;

use crate::shared::frame::Frame;

/// Destination for debug preview frames, one named window per renderer.
pub trait PreviewSink {
    fn show(&mut self, window: &str, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    fn close(&mut self, window: &str);
}

/// Something that can draw itself into a preview window.
pub trait Renderable: Send {
    fn window_name(&self) -> &str;

    /// Draws the current state. Returns `false` when there was nothing to
    /// show, in which case the renderer's children are skipped as well.
    fn render(&mut self, sink: &mut dyn PreviewSink) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RendererId(usize);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RendererError {
    #[error("renderer {0:?} is not registered")]
    Unknown(RendererId),
}

struct RendererNode {
    renderer: Box<dyn Renderable>,
    parent: Option<RendererId>,
    children: Vec<RendererId>,
    enabled: bool,
}

/// Owns every registered renderer and the parent/child links between them.
///
/// Links are arena indices, so a child can never outlive its parent's slot:
/// removing a renderer removes its whole subtree. `render_all` walks roots
/// in registration order and descends only into parents that drew a frame.
#[derive(Default)]
pub struct RendererArena {
    nodes: Vec<Option<RendererNode>>,
}

impl RendererArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_root(&mut self, renderer: Box<dyn Renderable>) -> RendererId {
        self.insert(renderer, None)
    }

    pub fn add_child(
        &mut self,
        parent: RendererId,
        renderer: Box<dyn Renderable>,
    ) -> Result<RendererId, RendererError> {
        if self.node(parent).is_none() {
            return Err(RendererError::Unknown(parent));
        }
        let id = self.insert(renderer, Some(parent));
        if let Some(node) = self.node_mut(parent) {
            node.children.push(id);
        }
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: RendererId) -> bool {
        self.node(id).is_some()
    }

    pub fn is_rendering(&self, id: RendererId) -> bool {
        self.node(id).is_some_and(|n| n.enabled)
    }

    /// Renders every enabled root and, recursively, its enabled children.
    pub fn render_all(&mut self, sink: &mut dyn PreviewSink) {
        let roots: Vec<RendererId> = self.ids().filter(|&id| self.parent_of(id).is_none()).collect();
        for root in roots {
            self.render_subtree(root, sink);
        }
    }

    /// Re-enables a renderer and its subtree.
    pub fn start_rendering(&mut self, id: RendererId) -> Result<(), RendererError> {
        for member in self.subtree(id)? {
            if let Some(node) = self.node_mut(member) {
                node.enabled = true;
            }
        }
        Ok(())
    }

    /// Disables a renderer and its subtree and closes their windows.
    pub fn stop_rendering(
        &mut self,
        id: RendererId,
        sink: &mut dyn PreviewSink,
    ) -> Result<(), RendererError> {
        for member in self.subtree(id)? {
            if let Some(node) = self.node_mut(member) {
                if node.enabled {
                    node.enabled = false;
                    sink.close(node.renderer.window_name());
                }
            }
        }
        Ok(())
    }

    /// Stops every renderer, closing all open windows.
    pub fn stop_all(&mut self, sink: &mut dyn PreviewSink) {
        let roots: Vec<RendererId> = self.ids().filter(|&id| self.parent_of(id).is_none()).collect();
        for root in roots {
            let _ = self.stop_rendering(root, sink);
        }
    }

    /// Unregisters a renderer together with its subtree.
    pub fn remove(&mut self, id: RendererId, sink: &mut dyn PreviewSink) -> Result<(), RendererError> {
        self.stop_rendering(id, sink)?;
        let members = self.subtree(id)?;
        if let Some(parent) = self.parent_of(id) {
            if let Some(node) = self.node_mut(parent) {
                node.children.retain(|&c| c != id);
            }
        }
        for member in members {
            self.nodes[member.0] = None;
        }
        Ok(())
    }

    fn render_subtree(&mut self, id: RendererId, sink: &mut dyn PreviewSink) {
        let Some(node) = self.node_mut(id) else {
            return;
        };
        if !node.enabled || !node.renderer.render(sink) {
            return;
        }
        let children = node.children.clone();
        for child in children {
            self.render_subtree(child, sink);
        }
    }

    fn subtree(&self, id: RendererId) -> Result<Vec<RendererId>, RendererError> {
        if self.node(id).is_none() {
            return Err(RendererError::Unknown(id));
        }
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.node(current) {
                out.push(current);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        Ok(out)
    }

    fn insert(&mut self, renderer: Box<dyn Renderable>, parent: Option<RendererId>) -> RendererId {
        let id = RendererId(self.nodes.len());
        self.nodes.push(Some(RendererNode {
            renderer,
            parent,
            children: Vec::new(),
            enabled: true,
        }));
        id
    }

    fn ids(&self) -> impl Iterator<Item = RendererId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_some())
            .map(|(i, _)| RendererId(i))
    }

    fn parent_of(&self, id: RendererId) -> Option<RendererId> {
        self.node(id).and_then(|n| n.parent)
    }

    fn node(&self, id: RendererId) -> Option<&RendererNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: RendererId) -> Option<&mut RendererNode> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }
}
