// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Registry of the helper functions callable from expressions.

use crate::expr::ExprError;
use crate::value::Value;

/// Signature of a helper function implementation.
pub type Implementation = fn(&[Value]) -> Result<Value, ExprError>;

/// Description of a registered helper function.
#[derive(Clone, Copy)]
pub struct Function {
    pub name: &'static str,
    /// Names of the parameters, the arity is the length of the list.
    pub parameters: &'static [&'static str],
    pub implementation: Implementation,
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.parameters.join(", "))
    }
}

const FUNCTIONS: &[Function] = &[
    Function {
        name: "CalculatePaddedSize",
        parameters: &["width", "height", "bitsPerPixel"],
        implementation: calculate_padded_size,
    },
    Function { name: "AlignUp", parameters: &["value", "alignment"], implementation: align_up },
];

/// Return the helper function registered under `name`.
pub fn lookup(name: &str) -> Option<&'static Function> {
    FUNCTIONS.iter().find(|f| f.name == name)
}

/// Iterate over all registered helper functions.
pub fn iter() -> impl Iterator<Item = &'static Function> {
    FUNCTIONS.iter()
}

impl Function {
    /// Invoke the function after checking the argument count.
    pub fn call(&self, args: &[Value]) -> Result<Value, ExprError> {
        if args.len() != self.parameters.len() {
            return Err(ExprError::ArgumentCount {
                function: self.name,
                expected: self.parameters.len(),
                got: args.len(),
            });
        }
        (self.implementation)(args)
    }

    fn overflow(&self) -> ExprError {
        ExprError::Function { function: self.name, message: "size overflows".to_owned() }
    }

    fn number(&self, args: &[Value], index: usize) -> Result<f64, ExprError> {
        args[index].as_number().ok_or_else(|| ExprError::ArgumentType {
            function: self.name,
            parameter: self.parameters[index],
            found: args[index].kind(),
        })
    }
}

/// Total size of a pixel array whose rows are padded to a 4-byte
/// boundary.
fn calculate_padded_size(args: &[Value]) -> Result<Value, ExprError> {
    let function = &FUNCTIONS[0];
    let width = function.number(args, 0)?;
    let height = function.number(args, 1)?;
    let bits_per_pixel = function.number(args, 2)?;

    if bits_per_pixel == 0.0 {
        return Err(ExprError::Function {
            function: function.name,
            message: "bitsPerPixel cannot be zero".to_owned(),
        });
    }
    let bytes_per_pixel = (bits_per_pixel / 8.0).trunc() as i64;
    if bytes_per_pixel <= 0 {
        return Err(ExprError::Function {
            function: function.name,
            message: format!("unsupported bitsPerPixel {bits_per_pixel}"),
        });
    }

    let bytes_per_row =
        (width.trunc() as i64).checked_mul(bytes_per_pixel).ok_or_else(|| function.overflow())?;
    let padding = (4 - bytes_per_row % 4) % 4;
    let total_size = bytes_per_row
        .checked_add(padding)
        .and_then(|padded_row| (height.trunc() as i64).checked_mul(padded_row))
        .ok_or_else(|| function.overflow())?;
    Ok(Value::Number(total_size as f64))
}

/// Round `value` up to the next multiple of `alignment`.
fn align_up(args: &[Value]) -> Result<Value, ExprError> {
    let function = &FUNCTIONS[1];
    let value = function.number(args, 0)?.trunc() as i64;
    let alignment = function.number(args, 1)?.trunc() as i64;
    if alignment <= 0 {
        return Err(ExprError::Function {
            function: function.name,
            message: format!("alignment must be positive, got {alignment}"),
        });
    }
    let aligned = value
        .checked_add(alignment - 1)
        .and_then(|value| value.div_euclid(alignment).checked_mul(alignment))
        .ok_or_else(|| function.overflow())?;
    Ok(Value::Number(aligned as f64))
}
