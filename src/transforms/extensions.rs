//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::Module;
use crate::utility::SaHashSet;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// Every extension the dead-branch pass knows to be safe to transform.
pub const DEFAULT_EXTENSIONS: [&str; 22] = [
    "SPV_AMD_shader_explicit_vertex_parameter",
    "SPV_AMD_shader_trinary_minmax",
    "SPV_AMD_gcn_shader",
    "SPV_KHR_shader_ballot",
    "SPV_AMD_shader_ballot",
    "SPV_AMD_gpu_shader_half_float",
    "SPV_KHR_shader_draw_parameters",
    "SPV_KHR_subgroup_vote",
    "SPV_KHR_16bit_storage",
    "SPV_KHR_device_group",
    "SPV_KHR_multiview",
    "SPV_NVX_multiview_per_view_attributes",
    "SPV_NV_viewport_array2",
    "SPV_NV_stereo_view_rendering",
    "SPV_NV_sample_mask_override_coverage",
    "SPV_NV_geometry_shader_passthrough",
    "SPV_AMD_texture_gather_bias_lod",
    "SPV_KHR_storage_buffer_storage_class",
    "SPV_KHR_variable_pointers",
    "SPV_AMD_gpu_shader_int16",
    "SPV_KHR_post_depth_coverage",
    "SPV_KHR_shader_atomic_counter_ops",
];

/// The set of extensions a pass is allowed to see in a module.
///
/// An extension can change the meaning of existing instructions, so a pass
/// that hasn't been taught about an extension can't assume anything about a
/// module that declares it. This is built once and shared by reference, it
/// never changes after construction.
///
/// ```
/// # use spinel::transforms::ExtensionWhitelist;
/// let defaults = ExtensionWhitelist::default();
/// let custom: ExtensionWhitelist = ["SPV_KHR_multiview"].into_iter().collect();
///
/// assert!(defaults.contains("SPV_KHR_variable_pointers"));
/// assert!(!custom.contains("SPV_KHR_variable_pointers"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "enable-serde", serde(transparent))]
pub struct ExtensionWhitelist {
    names: SaHashSet<String>,
}

impl ExtensionWhitelist {
    /// Creates a whitelist that allows no extensions at all.
    pub fn empty() -> Self {
        Self {
            names: SaHashSet::default(),
        }
    }

    /// Checks whether an extension is in the whitelist.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Gets the number of extensions in the whitelist.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Checks if the whitelist allows no extensions.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Returns the first extension declared by `module` that isn't in the
    /// whitelist, if there is one.
    pub fn first_unsupported<'m>(&self, module: &'m Module) -> Option<&'m str> {
        module.extensions().find(|name| !self.contains(name))
    }
}

impl Default for ExtensionWhitelist {
    fn default() -> Self {
        DEFAULT_EXTENSIONS.into_iter().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for ExtensionWhitelist {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Checks that every extension `module` declares is in `whitelist`.
pub fn all_extensions_supported(module: &Module, whitelist: &ExtensionWhitelist) -> bool {
    whitelist.first_unsupported(module).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ModuleBuilder;

    #[test]
    fn default_has_every_known_extension() {
        let whitelist = ExtensionWhitelist::default();

        assert_eq!(whitelist.len(), 22);
        assert!(DEFAULT_EXTENSIONS.iter().all(|ext| whitelist.contains(ext)));
        assert!(!whitelist.contains("SPV_KHR_ray_tracing"));
    }

    #[test]
    fn gate_rejects_unknown_extensions() {
        let mut mb = ModuleBuilder::shader();

        mb.extension("SPV_KHR_multiview");

        let whitelist = ExtensionWhitelist::default();

        assert!(all_extensions_supported(mb.module(), &whitelist));
        assert!(!all_extensions_supported(mb.module(), &ExtensionWhitelist::empty()));

        mb.extension("SPV_KHR_ray_tracing");

        assert!(!all_extensions_supported(mb.module(), &whitelist));
        assert_eq!(
            whitelist.first_unsupported(mb.module()),
            Some("SPV_KHR_ray_tracing")
        );
    }

    #[test]
    fn modules_without_extensions_always_pass() {
        let mb = ModuleBuilder::shader();

        assert!(all_extensions_supported(mb.module(), &ExtensionWhitelist::empty()));
    }

    #[cfg(feature = "enable-serde")]
    use serde_test::{assert_tokens, Token};

    #[test]
    #[cfg(feature = "enable-serde")]
    fn serializes_as_a_list_of_names() {
        let whitelist: ExtensionWhitelist = ["SPV_KHR_multiview"].into_iter().collect();

        assert_tokens(
            &whitelist,
            &[
                Token::Seq { len: Some(1) },
                Token::Str("SPV_KHR_multiview"),
                Token::SeqEnd,
            ],
        );
    }
}
