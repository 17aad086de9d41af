use super::intake::{IntakeItem, ItemId};

/// Ordered, identity-based subset of the current intake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: Vec<ItemId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every item that has a readable source, in intake order.
    pub fn all_of(items: &[IntakeItem]) -> Self {
        Self { ids: selectable(items).map(|i| i.id).collect() }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.ids.contains(&id)
    }

    pub fn ids(&self) -> &[ItemId] {
        &self.ids
    }

    /// Recomputed on every call; there is no stored "select all" flag.
    /// Items without a source never count.
    pub fn is_all(&self, items: &[IntakeItem]) -> bool {
        let selectable = selectable(items).count();
        selectable > 0 && self.ids.len() == selectable
    }

    pub fn toggle_all(&mut self, items: &[IntakeItem]) {
        if self.is_all(items) {
            self.ids.clear();
        } else {
            *self = Self::all_of(items);
        }
    }

    /// Returns whether the item is selected afterwards. Ids that are not part
    /// of `items`, or whose item has no source, are ignored.
    pub fn toggle(&mut self, id: ItemId, items: &[IntakeItem]) -> bool {
        if let Some(pos) = self.ids.iter().position(|s| *s == id) {
            self.ids.remove(pos);
            false
        } else if selectable(items).any(|i| i.id == id) {
            self.ids.push(id);
            true
        } else {
            false
        }
    }
}

fn selectable(items: &[IntakeItem]) -> impl Iterator<Item = &IntakeItem> {
    items.iter().filter(|i| i.file.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::intake::{AcceptFilter, IncomingFile, build_intake};
    use crate::converter::objects::ObjectStore;
    use std::path::PathBuf;

    fn intake(n: usize) -> (ObjectStore, Vec<IntakeItem>) {
        let store = ObjectStore::new();
        let files = (0..n)
            .map(|i| IncomingFile::from_bytes(format!("img{i}.png"), vec![0u8; 8]))
            .collect();
        let items = build_intake(files, &AcceptFilter::images(), &store);
        (store, items)
    }

    #[test]
    fn toggle_all_selects_then_clears() {
        let (_store, items) = intake(3);
        let mut selection = Selection::new();

        selection.toggle_all(&items);
        assert_eq!(selection, Selection::all_of(&items));
        assert!(selection.is_all(&items));

        selection.toggle_all(&items);
        assert!(selection.is_empty());
    }

    #[test]
    fn toggle_all_on_empty_intake_is_a_no_op() {
        let mut selection = Selection::new();
        selection.toggle_all(&[]);
        assert!(selection.is_empty());
        assert!(!selection.is_all(&[]));
    }

    #[test]
    fn partial_selection_makes_toggle_all_select_everything() {
        let (_store, items) = intake(3);
        let mut selection = Selection::all_of(&items);
        selection.toggle(items[1].id, &items);
        assert!(!selection.is_all(&items));

        selection.toggle_all(&items);
        assert_eq!(selection.len(), 3);
    }

    #[test]
    fn toggle_one_appends_in_click_order() {
        let (_store, items) = intake(3);
        let mut selection = Selection::new();

        assert!(selection.toggle(items[2].id, &items));
        assert!(selection.toggle(items[0].id, &items));
        assert_eq!(selection.ids(), &[items[2].id, items[0].id]);

        assert!(!selection.toggle(items[2].id, &items));
        assert_eq!(selection.ids(), &[items[0].id]);
    }

    #[test]
    fn foreign_ids_are_ignored() {
        let (_store, items) = intake(1);
        let (_other_store, other) = intake(1);
        let mut selection = Selection::new();
        assert!(!selection.toggle(other[0].id, &items));
        assert!(selection.is_empty());
    }

    #[test]
    fn items_without_source_are_not_selectable() {
        let store = ObjectStore::new();
        let files = vec![
            IncomingFile::from_bytes("a.png", vec![0u8; 8]),
            IncomingFile::from_path(PathBuf::from("/nope/b.png")),
        ];
        let items = build_intake(files, &AcceptFilter::images(), &store);
        assert!(items[1].file.is_none());

        assert_eq!(Selection::all_of(&items).ids(), &[items[0].id]);

        let mut selection = Selection::new();
        assert!(!selection.toggle(items[1].id, &items));
        assert!(selection.toggle(items[0].id, &items));
        assert!(selection.is_all(&items));

        selection.toggle_all(&items);
        assert!(selection.is_empty());
    }

    #[test]
    fn only_unreadable_items_never_count_as_all_selected() {
        let store = ObjectStore::new();
        let files = vec![IncomingFile::from_path(PathBuf::from("/nope/c.png"))];
        let items = build_intake(files, &AcceptFilter::images(), &store);

        let mut selection = Selection::all_of(&items);
        assert!(selection.is_empty());
        assert!(!selection.is_all(&items));

        selection.toggle_all(&items);
        assert!(selection.is_empty());
    }
}
