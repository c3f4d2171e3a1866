use crate::processing::color::HexColor;
use crate::scene::{ObjectId, ObjectKind, Scene, TextRun};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    None,
    Selected(ObjectId),
}

impl Selection {
    pub fn id(&self) -> Option<ObjectId> {
        match self {
            Selection::None => None,
            Selection::Selected(id) => Some(*id),
        }
    }
}

/// Text property controls mirrored from / into the selected object.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyPanel {
    pub font_size: u32,
    pub fill: HexColor,
    pub font_family: String,
    pub delete_visible: bool,
}

impl PropertyPanel {
    pub fn new(font_size: u32, fill: HexColor, font_family: impl Into<String>) -> Self {
        Self {
            font_size,
            fill,
            font_family: font_family.into(),
            delete_visible: false,
        }
    }
}

/// Selection state machine plus the panel bound to it.
#[derive(Debug, Clone)]
pub struct SelectionState {
    selection: Selection,
    panel: PropertyPanel,
}

impl SelectionState {
    pub fn new(panel: PropertyPanel) -> Self {
        Self {
            selection: Selection::None,
            panel,
        }
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn panel(&self) -> &PropertyPanel {
        &self.panel
    }

    /// NoSelection/Selected -> Selected(id). Text attributes flow into the panel.
    pub fn select(&mut self, scene: &Scene, id: ObjectId) -> bool {
        let Some(obj) = scene.get(id) else {
            return false;
        };
        self.selection = Selection::Selected(id);
        self.panel.delete_visible = true;
        if let ObjectKind::Text(text) = &obj.kind {
            self.panel.font_size = text.font_size;
            self.panel.fill = text.fill;
            self.panel.font_family = text.font_family.clone();
        }
        true
    }

    pub fn deselect(&mut self) {
        self.selection = Selection::None;
        self.panel.delete_visible = false;
    }

    /// Drops the selection if it points at an object that no longer exists.
    pub fn reconcile(&mut self, scene: &Scene) {
        if let Selection::Selected(id) = self.selection
            && scene.get(id).is_none()
        {
            self.deselect();
        }
    }

    pub fn set_font_size(&mut self, scene: &mut Scene, size: u32) -> bool {
        self.panel.font_size = size;
        self.edit_text(scene, |t| t.font_size = size)
    }

    pub fn set_fill(&mut self, scene: &mut Scene, fill: HexColor) -> bool {
        self.panel.fill = fill;
        self.edit_text(scene, |t| t.fill = fill)
    }

    pub fn set_font_family(&mut self, scene: &mut Scene, family: &str) -> bool {
        self.panel.font_family = family.to_string();
        self.edit_text(scene, |t| t.font_family = family.to_string())
    }

    fn edit_text(&mut self, scene: &mut Scene, edit: impl FnOnce(&mut TextRun)) -> bool {
        let Some(id) = self.selection.id() else {
            return false;
        };
        let Some(text) = scene.get_mut(id).and_then(|o| o.as_text_mut()) else {
            return false;
        };
        edit(text);
        scene.request_render();
        true
    }
}
