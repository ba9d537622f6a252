//! Family/member consistency workflow
//!
//! Keeps each family's `kepalaKeluarga` equal to the `nama` of its single
//! head member. Every write touching both records goes out as one batch, so
//! a family and its head are never observed out of sync.

use futures::{Stream, StreamExt};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::StreamMap;
use tracing::{debug, info, warn};

use warga_common::models::{
    anggota_collection, Anggota, FamilyRecord, Keluarga, MemberRecord, StatusHubungan,
    KELUARGA_COLLECTION,
};
use warga_common::store::{
    to_fields, Document, DocumentStore, LiveCollection, SnapshotUpdate, Subscription, WriteBatch,
};
use warga_common::validation::{validate_family_with_head, FamilyForm, MemberForm};
use warga_common::{Error, Result};

const HEAD_DELETE_GUARD: &str =
    "Kepala keluarga tidak dapat dihapus langsung. Hapus data keluarga sebagai gantinya.";
const SECOND_HEAD_GUARD: &str = "Keluarga ini sudah memiliki kepala keluarga.";
const HEAD_DEMOTE_GUARD: &str =
    "Status kepala keluarga tidak dapat diubah dari sini. Ubah melalui data keluarga.";

/// Identifiers generated by [`FamilyService::create_family`]
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedFamily {
    pub family_id: String,
    pub head_id: String,
}

/// Family and member operations with cascade and guard rules
#[derive(Clone)]
pub struct FamilyService {
    store: Arc<dyn DocumentStore>,
}

impl FamilyService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Live, arrival-ordered family list with nested member lists
    ///
    /// Never ends on its own; drop the feed to cancel it.
    pub fn list_families(&self) -> FamilyFeed {
        FamilyFeed::open(self.store.clone())
    }

    /// One-shot read of every family with its members
    pub async fn snapshot(&self) -> Result<Vec<FamilyRecord>> {
        let docs = self.store.list(KELUARGA_COLLECTION).await?;
        let mut families = Vec::with_capacity(docs.len());
        for doc in docs {
            let keluarga: Keluarga = doc.decode()?;
            let anggota = self.load_members(&doc.id).await?;
            families.push(FamilyRecord {
                id: doc.id,
                keluarga,
                anggota,
            });
        }
        Ok(families)
    }

    pub async fn get_family(&self, family_id: &str) -> Result<FamilyRecord> {
        let keluarga = self.require_family(family_id).await?;
        let anggota = self.load_members(family_id).await?;
        Ok(FamilyRecord {
            id: family_id.to_string(),
            keluarga,
            anggota,
        })
    }

    pub async fn list_members(&self, family_id: &str) -> Result<Vec<MemberRecord>> {
        self.require_family(family_id).await?;
        self.load_members(family_id).await
    }

    /// Create a family and its head member in one batch
    ///
    /// The head is always stored as `Kepala Keluarga`, whatever the form says.
    pub async fn create_family(
        &self,
        family_form: &FamilyForm,
        head_form: &MemberForm,
    ) -> Result<CreatedFamily> {
        let (family, mut head) = validate_family_with_head(family_form, head_form)?;
        head.status_hubungan = StatusHubungan::KepalaKeluarga;

        let existing = self
            .store
            .query_eq(KELUARGA_COLLECTION, "noKK", &family.no_kk)
            .await?;
        if !existing.is_empty() {
            warn!(no_kk = %family.no_kk, "No. KK already registered to another family");
        }

        let family_id = self.store.new_id();
        let head_id = self.store.new_id();
        let keluarga = Keluarga {
            no_kk: family.no_kk,
            alamat: family.alamat,
            kepala_keluarga: head.nama.clone(),
        };

        let mut batch = WriteBatch::new();
        batch
            .set(KELUARGA_COLLECTION, &family_id, serde_json::to_value(&keluarga)?)
            .set(
                &anggota_collection(&family_id),
                &head_id,
                serde_json::to_value(&head)?,
            );
        self.store.commit(batch).await?;

        info!(family_id = %family_id, no_kk = %keluarga.no_kk, "Family created");
        Ok(CreatedFamily { family_id, head_id })
    }

    /// Update family fields and the head member together
    ///
    /// A family found without a head gets one created from `head_form`.
    pub async fn update_family(
        &self,
        family_id: &str,
        family_form: &FamilyForm,
        head_form: &MemberForm,
    ) -> Result<()> {
        let (family, mut head) = validate_family_with_head(family_form, head_form)?;
        head.status_hubungan = StatusHubungan::KepalaKeluarga;

        self.require_family(family_id).await?;
        let members = anggota_collection(family_id);
        let heads = self.find_heads(family_id).await?;
        if heads.len() > 1 {
            warn!(family_id = %family_id, heads = heads.len(), "Family has more than one head");
        }

        let head_id = match heads.first() {
            Some(doc) => doc.id.clone(),
            None => {
                warn!(family_id = %family_id, "Family has no head member, creating one");
                self.store.new_id()
            }
        };

        let keluarga = Keluarga {
            no_kk: family.no_kk,
            alamat: family.alamat,
            kepala_keluarga: head.nama.clone(),
        };

        let mut batch = WriteBatch::new();
        batch
            .update(KELUARGA_COLLECTION, family_id, to_fields(&keluarga)?)
            .set(&members, &head_id, serde_json::to_value(&head)?);
        self.store.commit(batch).await?;

        info!(family_id = %family_id, head_id = %head_id, "Family updated");
        Ok(())
    }

    /// Delete every member of the family, then the family, in one batch
    pub async fn delete_family(&self, family_id: &str) -> Result<()> {
        self.require_family(family_id).await?;
        let members = anggota_collection(family_id);

        let mut batch = WriteBatch::new();
        for doc in self.store.list(&members).await? {
            batch.delete(&members, &doc.id);
        }
        let member_count = batch.len();
        batch.delete(KELUARGA_COLLECTION, family_id);
        self.store.commit(batch).await?;

        info!(family_id = %family_id, members = member_count, "Family deleted");
        Ok(())
    }

    /// Add a member; a head member is only accepted when the family has none
    pub async fn create_member(&self, family_id: &str, form: &MemberForm) -> Result<String> {
        let anggota = form.validate()?;
        self.require_family(family_id).await?;

        let member_id = self.store.new_id();
        let mut batch = WriteBatch::new();
        if anggota.is_head() {
            if !self.find_heads(family_id).await?.is_empty() {
                return Err(Error::Guard(SECOND_HEAD_GUARD.to_string()));
            }
            batch.update(KELUARGA_COLLECTION, family_id, head_mirror(&anggota));
        }
        batch.set(
            &anggota_collection(family_id),
            &member_id,
            serde_json::to_value(&anggota)?,
        );
        self.store.commit(batch).await?;

        info!(family_id = %family_id, member_id = %member_id, "Member created");
        Ok(member_id)
    }

    /// Overwrite a member's fields
    ///
    /// Writes to the head member also refresh the family's `kepalaKeluarga`.
    pub async fn update_member(
        &self,
        family_id: &str,
        member_id: &str,
        form: &MemberForm,
    ) -> Result<()> {
        let anggota = form.validate()?;
        let current = self.require_member(family_id, member_id).await?;

        let mut batch = WriteBatch::new();
        match (current.is_head(), anggota.is_head()) {
            (true, false) => return Err(Error::Guard(HEAD_DEMOTE_GUARD.to_string())),
            (false, true) => {
                let other_heads = self.find_heads(family_id).await?;
                if other_heads.iter().any(|doc| doc.id != member_id) {
                    return Err(Error::Guard(SECOND_HEAD_GUARD.to_string()));
                }
                batch.update(KELUARGA_COLLECTION, family_id, head_mirror(&anggota));
            }
            (true, true) => {
                batch.update(KELUARGA_COLLECTION, family_id, head_mirror(&anggota));
            }
            (false, false) => {}
        }
        batch.set(
            &anggota_collection(family_id),
            member_id,
            serde_json::to_value(&anggota)?,
        );
        self.store.commit(batch).await?;

        info!(family_id = %family_id, member_id = %member_id, "Member updated");
        Ok(())
    }

    /// Delete a non-head member
    pub async fn delete_member(&self, family_id: &str, member_id: &str) -> Result<()> {
        let current = self.require_member(family_id, member_id).await?;
        if current.is_head() {
            return Err(Error::Guard(HEAD_DELETE_GUARD.to_string()));
        }

        self.store
            .delete(&anggota_collection(family_id), member_id)
            .await?;

        info!(family_id = %family_id, member_id = %member_id, "Member deleted");
        Ok(())
    }

    async fn require_family(&self, family_id: &str) -> Result<Keluarga> {
        match self.store.get(KELUARGA_COLLECTION, family_id).await? {
            Some(doc) => doc.decode(),
            None => Err(Error::NotFound(format!("Keluarga {}", family_id))),
        }
    }

    async fn require_member(&self, family_id: &str, member_id: &str) -> Result<Anggota> {
        match self
            .store
            .get(&anggota_collection(family_id), member_id)
            .await?
        {
            Some(doc) => doc.decode(),
            None => Err(Error::NotFound(format!(
                "Anggota {} pada keluarga {}",
                member_id, family_id
            ))),
        }
    }

    async fn find_heads(&self, family_id: &str) -> Result<Vec<Document>> {
        self.store
            .query_eq(
                &anggota_collection(family_id),
                "statusHubungan",
                StatusHubungan::KepalaKeluarga.as_str(),
            )
            .await
    }

    async fn load_members(&self, family_id: &str) -> Result<Vec<MemberRecord>> {
        self.store
            .list(&anggota_collection(family_id))
            .await?
            .into_iter()
            .map(|doc| {
                Ok(MemberRecord {
                    anggota: doc.decode()?,
                    id: doc.id,
                })
            })
            .collect()
    }
}

fn head_mirror(head: &Anggota) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("kepalaKeluarga".to_string(), json!(head.nama));
    fields
}

type UpdateStream = Pin<Box<dyn Stream<Item = Result<SnapshotUpdate>> + Send>>;

enum FeedEvent {
    Families(Option<Result<SnapshotUpdate>>),
    Members(String, Result<SnapshotUpdate>),
}

/// Live family list joined with one member subscription per family
///
/// Family and member updates arrive independently, so a family may briefly
/// be yielded before its member list has caught up.
pub struct FamilyFeed {
    store: Arc<dyn DocumentStore>,
    families_stream: UpdateStream,
    families: LiveCollection,
    member_streams: StreamMap<String, UpdateStream>,
    members: HashMap<String, LiveCollection>,
}

impl FamilyFeed {
    fn open(store: Arc<dyn DocumentStore>) -> Self {
        let families_stream: UpdateStream =
            Box::pin(Subscription::open(store.clone(), KELUARGA_COLLECTION).into_stream());
        Self {
            store,
            families_stream,
            families: LiveCollection::new(),
            member_streams: StreamMap::new(),
            members: HashMap::new(),
        }
    }

    /// Wait for the next change and return the full, current family list
    ///
    /// Returns `None` only when the store's change feed has shut down.
    pub async fn next(&mut self) -> Option<Result<Vec<FamilyRecord>>> {
        loop {
            // An empty StreamMap yields None at once, which disables its branch
            let event = tokio::select! {
                update = self.families_stream.next() => FeedEvent::Families(update),
                Some((family_id, update)) = self.member_streams.next() => {
                    FeedEvent::Members(family_id, update)
                }
            };

            match event {
                FeedEvent::Families(None) => return None,
                FeedEvent::Families(Some(Err(e))) => return Some(Err(e)),
                FeedEvent::Families(Some(Ok(update))) => {
                    self.families.apply(update);
                    self.sync_member_streams();
                    return Some(Ok(self.records()));
                }
                FeedEvent::Members(family_id, Ok(update)) => {
                    let view = self.members.entry(family_id).or_default();
                    if view.apply(update) {
                        return Some(Ok(self.records()));
                    }
                }
                FeedEvent::Members(family_id, Err(e)) => {
                    warn!(family_id = %family_id, error = %e, "Member subscription failed");
                }
            }
        }
    }

    /// Consume the feed as a stream of family lists
    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<FamilyRecord>>> + Send + 'static {
        futures::stream::unfold(self, |mut feed| async move {
            feed.next().await.map(|item| (item, feed))
        })
    }

    /// Subscribe to members of new families and release removed ones
    fn sync_member_streams(&mut self) {
        let current: Vec<String> = self.families.ids().map(str::to_string).collect();

        for family_id in &current {
            if !self.member_streams.contains_key(family_id) {
                debug!(family_id = %family_id, "Subscribing to family members");
                let stream = Subscription::open(self.store.clone(), anggota_collection(family_id))
                    .into_stream();
                self.member_streams
                    .insert(family_id.clone(), Box::pin(stream));
            }
        }

        let stale: Vec<String> = self
            .member_streams
            .keys()
            .filter(|id| !current.contains(id))
            .cloned()
            .collect();
        for family_id in stale {
            debug!(family_id = %family_id, "Releasing member subscription");
            self.member_streams.remove(&family_id);
            self.members.remove(&family_id);
        }
    }

    fn records(&self) -> Vec<FamilyRecord> {
        self.families
            .decode_all::<Keluarga>()
            .into_iter()
            .map(|(id, keluarga)| {
                let anggota = self
                    .members
                    .get(&id)
                    .map(|view| {
                        view.decode_all::<Anggota>()
                            .into_iter()
                            .map(|(id, anggota)| MemberRecord { id, anggota })
                            .collect()
                    })
                    .unwrap_or_default();
                FamilyRecord {
                    id,
                    keluarga,
                    anggota,
                }
            })
            .collect()
    }
}
