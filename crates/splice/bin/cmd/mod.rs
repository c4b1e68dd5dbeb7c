pub mod blueprint;
pub mod run;

use eyre::{bail, Result, WrapErr};
use splice_backend::{CallArg, FunctionSignature};

/// Coerces textual arguments against the overload of `signature` their number selects.
pub fn coerce_args(signature: &FunctionSignature, args: &[String]) -> Result<Vec<CallArg>> {
    let (min, max) = (signature.required(), signature.required() + signature.optional());
    if !(min..=max).contains(&args.len()) {
        bail!(
            "`{}` takes between {min} and {max} arguments, got {}",
            signature.name,
            args.len()
        );
    }

    signature
        .params(args.len() - min)
        .zip(args)
        .map(|(param, arg)| -> Result<CallArg> {
            let value = param
                .resolve()?
                .coerce_str(arg)
                .wrap_err_with(|| format!("invalid value for `{}`: {arg}", param.name))?;
            Ok(CallArg::from(value))
        })
        .collect()
}
