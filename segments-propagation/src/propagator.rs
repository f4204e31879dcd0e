//! Copies a base experience's page content to a new experience.

use crate::editable::EditableValuesDocument;
use segments_core::{
    ComponentLinkId, EntityRef, ExperienceId, GroupId, PlId, PreferencesEntry, PropagationConfig,
    SegmentsResult,
};
use segments_storage::{
    ComponentLinkStore, ComponentRegistry, PreferencesStore, StructureStore, TxScope,
};
use std::collections::BTreeMap;

/// Outcome of a preferences propagation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreferencesReport {
    /// Entries created for the new experience
    pub created: usize,
    /// Existing entries overwritten with the base blob
    pub updated: usize,
    /// Entries of components that are no longer deployed
    pub skipped_unregistered: usize,
}

/// Stateless propagator over the page stores.
///
/// Every write happens under the caller's transaction; the propagator
/// never touches data of the base experience.
pub struct ExperienceContentPropagator<'a, S: ?Sized> {
    stores: &'a S,
    config: &'a PropagationConfig,
}

impl<'a, S> ExperienceContentPropagator<'a, S>
where
    S: StructureStore + ComponentLinkStore + PreferencesStore + ComponentRegistry + ?Sized,
{
    pub fn new(stores: &'a S, config: &'a PropagationConfig) -> Self {
        Self { stores, config }
    }

    /// Copy the layout structure of `base` to `new` and return it.
    pub fn propagate_structure(
        &self,
        tx: &TxScope,
        group_id: GroupId,
        entity: EntityRef,
        new: ExperienceId,
        base: ExperienceId,
    ) -> SegmentsResult<String> {
        let data = self.stores.structure_fetch(group_id, entity, base, true)?;
        self.stores.structure_upsert(group_id, entity, new, &data)?;

        tracing::debug!(
            tx_id = tx.id(),
            %entity,
            base_experience_id = %base,
            experience_id = %new,
            bytes = data.len(),
            "Copied structure data"
        );
        Ok(data)
    }

    /// Give every editable field of every component on the page a value
    /// for `new`, persisted with a single batch update.
    pub fn propagate_editable_values(
        &self,
        tx: &TxScope,
        group_id: GroupId,
        entity: EntityRef,
        new: ExperienceId,
        base: ExperienceId,
    ) -> SegmentsResult<BTreeMap<ComponentLinkId, String>> {
        let links = self.stores.component_links_list(group_id, entity)?;
        let mut editable_values = BTreeMap::new();

        for link in links {
            let document = EditableValuesDocument::parse(&link.editable_values)?;
            let propagated = document.propagate(self.config, base, new)?;

            tracing::debug!(
                tx_id = tx.id(),
                component_link_id = %link.component_link_id,
                "Propagated editable values"
            );
            editable_values.insert(link.component_link_id, propagated.to_json_string());
        }

        if !editable_values.is_empty() {
            self.stores
                .component_links_update_editable_values(&editable_values)?;
        }
        Ok(editable_values)
    }

    /// Copy the preferences of every deployed component bound to `base`
    /// onto the same component bound to `new`. Running it twice yields the
    /// same preferences.
    pub fn propagate_preferences(
        &self,
        tx: &TxScope,
        owner: PlId,
        base: ExperienceId,
        new: ExperienceId,
    ) -> SegmentsResult<PreferencesReport> {
        let mut report = PreferencesReport::default();

        for entry in self.stores.preferences_list(owner)? {
            let component_instance_id = &entry.component_instance_id;

            if !self
                .stores
                .is_registered(component_instance_id.component_name())
            {
                tracing::warn!(
                    tx_id = tx.id(),
                    %owner,
                    component_instance_id = %component_instance_id,
                    "Skipping preferences of unregistered component"
                );
                report.skipped_unregistered += 1;
                continue;
            }

            if component_instance_id.experience_id()? != base {
                continue;
            }

            let target = PreferencesEntry {
                owner,
                component_instance_id: component_instance_id.with_experience(new)?,
                preferences: entry.preferences.clone(),
            };

            match self
                .stores
                .preferences_fetch(owner, &target.component_instance_id)?
            {
                None => {
                    self.stores.preferences_create(&target)?;
                    report.created += 1;
                }
                Some(_) => {
                    self.stores.preferences_update(&target)?;
                    report.updated += 1;
                }
            }
        }

        tracing::debug!(
            tx_id = tx.id(),
            %owner,
            created = report.created,
            updated = report.updated,
            skipped = report.skipped_unregistered,
            "Copied preferences"
        );
        Ok(report)
    }
}
