use super::{MutationHandle, MutationOutcome, MutationSpec};

/// Create, update and delete of one subject, e.g. the member-role editor.
///
/// Each kind keeps its own pending flag, so an update may run while a
/// delete is still in flight.
pub struct EditMutations<C: MutationSpec, U: MutationSpec, D: MutationSpec> {
    create: MutationHandle<C>,
    update: MutationHandle<U>,
    delete: MutationHandle<D>,
}

impl<C: MutationSpec, U: MutationSpec, D: MutationSpec> Clone for EditMutations<C, U, D> {
    fn clone(&self) -> Self {
        Self {
            create: self.create.clone(),
            update: self.update.clone(),
            delete: self.delete.clone(),
        }
    }
}

impl<C: MutationSpec, U: MutationSpec, D: MutationSpec> EditMutations<C, U, D> {
    pub fn new(create: MutationHandle<C>, update: MutationHandle<U>, delete: MutationHandle<D>) -> Self {
        Self {
            create,
            update,
            delete,
        }
    }

    pub async fn create(&self, args: C::Args) -> MutationOutcome<C::Payload> {
        self.create.run(args).await
    }

    pub async fn update(&self, args: U::Args) -> MutationOutcome<U::Payload> {
        self.update.run(args).await
    }

    pub async fn delete(&self, args: D::Args) -> MutationOutcome<D::Payload> {
        self.delete.run(args).await
    }

    pub fn is_creating(&self) -> bool {
        self.create.is_pending()
    }

    pub fn is_updating(&self) -> bool {
        self.update.is_pending()
    }

    pub fn is_deleting(&self) -> bool {
        self.delete.is_pending()
    }

    pub fn is_loading(&self) -> bool {
        self.is_creating() || self.is_updating() || self.is_deleting()
    }

    pub fn creator(&self) -> &MutationHandle<C> {
        &self.create
    }

    pub fn updater(&self) -> &MutationHandle<U> {
        &self.update
    }

    pub fn deleter(&self) -> &MutationHandle<D> {
        &self.delete
    }
}
