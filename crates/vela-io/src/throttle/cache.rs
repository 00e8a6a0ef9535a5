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

//! Weak cache of delivered resources.
//!
//! A resource stays cached for as long as some caller still holds its handle.
//! Once the last handle is dropped, the next request decodes it again.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use vela_core::asset::{Asset, AssetHandle, WeakAssetHandle};
use vela_core::resource::ResourceKey;

type Slots<T> = HashMap<ResourceKey, WeakAssetHandle<T>>;

/// Delivered resources by result type and key.
pub(crate) struct ResourceCache {
    enabled: bool,
    by_type: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl ResourceCache {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            enabled,
            by_type: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TypeId, Box<dyn Any + Send + Sync>>> {
        self.by_type.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The live resource for `key`, if one was delivered and is still held.
    pub(crate) fn get<T: Asset>(&self, key: &ResourceKey) -> Option<AssetHandle<T>> {
        if !self.enabled {
            return None;
        }
        let by_type = self.lock();
        by_type
            .get(&TypeId::of::<T>())
            .and_then(|slots| slots.downcast_ref::<Slots<T>>())
            .and_then(|slots| slots.get(key))
            .and_then(WeakAssetHandle::upgrade)
    }

    /// Remembers a delivered resource. Dead entries of the same type are
    /// dropped on the way.
    pub(crate) fn insert<T: Asset>(&self, key: ResourceKey, resource: &AssetHandle<T>) {
        if !self.enabled {
            return;
        }
        let mut by_type = self.lock();
        let slot = by_type
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(Slots::<T>::new()));
        let Some(slots) = slot.downcast_mut::<Slots<T>>() else {
            unreachable!("cache slot for {} holds another type", std::any::type_name::<T>());
        };
        slots.retain(|_, cached| cached.is_alive());
        slots.insert(key, AssetHandle::downgrade(resource));
    }
}
