//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::pass::Status;
use thiserror::Error;

/// The reasons a pass (or a pipeline of them) can decline to process a module.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Error)]
pub enum PassError {
    /// The module declares an extension that the pass doesn't know the
    /// semantics of, so nothing about the module can be assumed.
    #[error("module declares unsupported extension `{0}`")]
    UnsupportedExtension(String),
    /// The module doesn't declare the `Shader` capability, so its control
    /// flow isn't required to be structured.
    #[error("module does not declare the `Shader` capability")]
    MissingShaderCapability,
    /// The module applies decorations through `OpGroupDecorate`, which the
    /// debug-info cleanup can't keep consistent.
    #[error("module uses `OpGroupDecorate`")]
    GroupDecorations,
    /// A pipeline named a pass that doesn't exist.
    #[error("unknown pass `{0}`")]
    UnknownPass(String),
}

impl PassError {
    /// Gets the status the pass should report when it stops for this reason.
    ///
    /// An unsupported extension or an unknown pass is a failure, the other
    /// reasons mean the pass simply doesn't apply.
    pub fn status(&self) -> Status {
        match self {
            PassError::UnsupportedExtension(_) | PassError::UnknownPass(_) => Status::Failure,
            PassError::MissingShaderCapability | PassError::GroupDecorations => {
                Status::SuccessWithoutChange
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_and_statuses() {
        let err = PassError::UnsupportedExtension("SPV_KHR_fancy".to_owned());

        assert_eq!(err.to_string(), "module declares unsupported extension `SPV_KHR_fancy`");
        assert_eq!(err.status(), Status::Failure);
        assert_eq!(PassError::GroupDecorations.status(), Status::SuccessWithoutChange);
        assert_eq!(PassError::MissingShaderCapability.status(), Status::SuccessWithoutChange);
        assert_eq!(PassError::UnknownPass("mem2reg".to_owned()).status(), Status::Failure);
    }
}
