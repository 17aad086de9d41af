use super::format::OutputFormat;
use super::intake::{AcceptFilter, IncomingFile, IntakeItem, ItemId, build_intake};
use super::objects::ObjectStore;
use super::pipeline::{ConversionBatch, ConversionJob, ConversionOutcome};
use super::selection::Selection;

/// Everything the converter panel shows, minus rendering concerns.
#[derive(Debug)]
pub struct ConverterState {
    store: ObjectStore,
    filter: AcceptFilter,
    select_new_files: bool,
    items: Vec<IntakeItem>,
    selection: Selection,
    format: OutputFormat,
    results: Option<ConversionBatch>,
}

impl ConverterState {
    pub fn new(store: ObjectStore, filter: AcceptFilter) -> Self {
        Self {
            store,
            filter,
            select_new_files: true,
            items: Vec::new(),
            selection: Selection::new(),
            format: OutputFormat::default(),
            results: None,
        }
    }

    /// When set, a new intake starts fully selected; otherwise it starts with
    /// nothing selected. The previous selection never survives either way.
    pub fn set_select_new_files(&mut self, select: bool) {
        self.select_new_files = select;
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// Replaces the intake list wholesale. Previous previews are released.
    pub fn intake(&mut self, files: Vec<IncomingFile>) {
        self.items = build_intake(files, &self.filter, &self.store);
        self.selection = if self.select_new_files {
            Selection::all_of(&self.items)
        } else {
            Selection::new()
        };
    }

    pub fn items(&self) -> &[IntakeItem] {
        &self.items
    }

    /// Items that have a readable source; the rest stay out of the list.
    pub fn visible_items(&self) -> impl Iterator<Item = &IntakeItem> {
        self.items.iter().filter(|i| i.file.is_some())
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn is_selected(&self, id: ItemId) -> bool {
        self.selection.contains(id)
    }

    pub fn all_selected(&self) -> bool {
        self.selection.is_all(&self.items)
    }

    pub fn toggle_all(&mut self) {
        self.selection.toggle_all(&self.items);
    }

    pub fn toggle(&mut self, id: ItemId) -> bool {
        self.selection.toggle(id, &self.items)
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn set_format(&mut self, format: OutputFormat) {
        self.format = format;
    }

    /// Displayed estimate, in KB, for an item under the current format.
    pub fn estimate_kb(&self, item: &IntakeItem) -> f64 {
        self.format.estimate_kb(item.rounded_size_kb())
    }

    pub fn can_convert(&self) -> bool {
        !self.selection.is_empty()
    }

    /// Snapshot of the selection, in selection order.
    pub fn jobs(&self) -> Vec<ConversionJob> {
        self.selection
            .ids()
            .iter()
            .filter_map(|id| self.items.iter().find(|i| i.id == *id))
            .map(|item| ConversionJob {
                id: item.id,
                name: item.name.clone(),
                file: item.file.clone(),
                original_size_bytes: item.size_bytes,
            })
            .collect()
    }

    /// Swaps in a finished batch; the previous results and their references
    /// are dropped here.
    pub fn apply_batch(&mut self, batch: ConversionBatch) {
        self.results = Some(batch);
    }

    pub fn results(&self) -> Option<&ConversionBatch> {
        self.results.as_ref()
    }

    pub fn outcomes(&self) -> &[ConversionOutcome] {
        self.results.as_ref().map(|b| b.outcomes.as_slice()).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn files(sizes: &[usize]) -> Vec<IncomingFile> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, len)| IncomingFile::from_bytes(format!("pic{i}.png"), vec![0u8; *len]))
            .collect()
    }

    #[test]
    fn intake_discards_previous_selection() {
        let mut state = ConverterState::new(ObjectStore::new(), AcceptFilter::images());
        state.intake(files(&[10, 10]));
        let first = state.items()[0].id;
        assert!(state.is_selected(first));

        state.intake(files(&[10]));
        assert!(!state.is_selected(first));
        assert_eq!(state.selection().len(), 1);
    }

    #[test]
    fn intake_can_start_unselected() {
        let mut state = ConverterState::new(ObjectStore::new(), AcceptFilter::images());
        state.set_select_new_files(false);
        state.intake(files(&[10, 10]));
        assert!(state.selection().is_empty());
        assert!(!state.can_convert());

        state.toggle_all();
        assert!(state.all_selected());
    }

    #[test]
    fn new_intake_releases_old_previews() {
        let store = ObjectStore::new();
        let mut state = ConverterState::new(store.clone(), AcceptFilter::images());
        state.intake(files(&[1, 2, 3]));
        assert_eq!(store.live_count(), 3);

        state.intake(files(&[4]));
        assert_eq!(store.live_count(), 1);
    }

    #[test]
    fn estimate_follows_current_format() {
        let mut state = ConverterState::new(ObjectStore::new(), AcceptFilter::images());
        state.intake(files(&[102_400, 204_800]));
        state.set_format(OutputFormat::Webp);

        let labels: Vec<String> = state
            .items()
            .iter()
            .map(|i| format!("{:.2}", state.estimate_kb(i)))
            .collect();
        assert_eq!(labels, ["60.00", "120.00"]);
    }

    #[test]
    fn unreadable_files_do_not_block_select_all_or_enable_convert() {
        let mut state = ConverterState::new(ObjectStore::new(), AcceptFilter::images());
        state.set_select_new_files(false);
        state.intake(vec![
            IncomingFile::from_bytes("a.png", vec![0u8; 16]),
            IncomingFile::from_path(PathBuf::from("/nope/b.png")),
        ]);

        let visible: Vec<ItemId> = state.visible_items().map(|i| i.id).collect();
        assert_eq!(visible.len(), 1);
        for id in visible {
            state.toggle(id);
        }
        assert_eq!(state.selection().len(), 1);
        assert!(state.all_selected());

        state.set_select_new_files(true);
        state.intake(vec![IncomingFile::from_path(PathBuf::from("/nope/c.png"))]);
        assert_eq!(state.visible_items().count(), 0);
        assert!(!state.can_convert());
        assert!(state.jobs().is_empty());
    }

    #[test]
    fn jobs_follow_selection_order() {
        let mut state = ConverterState::new(ObjectStore::new(), AcceptFilter::images());
        state.set_select_new_files(false);
        state.intake(files(&[1, 1, 1]));
        let ids: Vec<ItemId> = state.items().iter().map(|i| i.id).collect();

        state.toggle(ids[2]);
        state.toggle(ids[0]);
        let order: Vec<ItemId> = state.jobs().iter().map(|j| j.id).collect();
        assert_eq!(order, [ids[2], ids[0]]);
    }
}
