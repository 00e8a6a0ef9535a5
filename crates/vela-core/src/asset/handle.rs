// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::Asset;
use std::{
    fmt,
    ops::Deref,
    sync::{Arc, Weak},
};

/// A thread-safe, reference-counted handle to a loaded asset.
///
/// Every callback that deduplicated onto the same load receives a clone of
/// one handle, so [`AssetHandle::ptr_eq`] holds between all of them.
pub struct AssetHandle<T: Asset>(Arc<T>);

impl<T: Asset> AssetHandle<T> {
    /// Creates a new `AssetHandle` that takes ownership of the asset data.
    pub fn new(asset: T) -> Self {
        Self(Arc::new(asset))
    }

    /// Returns `true` if both handles point at the same loaded instance.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.0, &other.0)
    }

    /// Number of live handles to this asset.
    pub fn strong_count(this: &Self) -> usize {
        Arc::strong_count(&this.0)
    }

    /// Creates a handle that does not keep the asset alive.
    pub fn downgrade(this: &Self) -> WeakAssetHandle<T> {
        WeakAssetHandle(Arc::downgrade(&this.0))
    }
}

/// A non-owning reference to a loaded asset, used by caches that must not
/// extend an asset's lifetime.
pub struct WeakAssetHandle<T: Asset>(Weak<T>);

impl<T: Asset> WeakAssetHandle<T> {
    /// Returns a strong handle if the asset is still alive.
    pub fn upgrade(&self) -> Option<AssetHandle<T>> {
        self.0.upgrade().map(AssetHandle)
    }

    /// Returns `true` while some [`AssetHandle`] keeps the asset alive.
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl<T: Asset> Clone for WeakAssetHandle<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Asset> Clone for AssetHandle<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Asset> Deref for AssetHandle<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: Asset + fmt::Debug> fmt::Debug for AssetHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AssetHandle").field(&self.0).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Blob(u32);
    impl Asset for Blob {}

    #[test]
    fn clones_share_the_instance() {
        let a = AssetHandle::new(Blob(7));
        let b = a.clone();
        let c = AssetHandle::new(Blob(7));

        assert!(AssetHandle::ptr_eq(&a, &b));
        assert!(!AssetHandle::ptr_eq(&a, &c));
        assert_eq!(*b, Blob(7));
        assert_eq!(AssetHandle::strong_count(&a), 2);
    }

    #[test]
    fn weak_handles_do_not_keep_the_asset_alive() {
        let strong = AssetHandle::new(Blob(1));
        let weak = AssetHandle::downgrade(&strong);

        let upgraded = weak.upgrade().unwrap();
        assert!(AssetHandle::ptr_eq(&strong, &upgraded));

        drop(strong);
        drop(upgraded);
        assert!(!weak.is_alive());
        assert!(weak.upgrade().is_none());
    }
}
