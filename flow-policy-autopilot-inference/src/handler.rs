//! Thin entry point for a deployed flow
//!
//! The function's code is the flow runtime plus the flow document; the entry point only
//! builds the runtime's handler from `<flow>.json` and exports it.

/// File name of the generated entry point
pub const HANDLER_FILE: &str = "lambda.js";

/// Exported handler name inside [`HANDLER_FILE`]
pub const HANDLER_EXPORT: &str = "handler";

/// Package providing the flow runtime
pub const RUNTIME_PACKAGE: &str = "@kumologica/runtime";

/// The handler reference to set on the function (`lambda.handler`)
pub fn handler_reference() -> String {
    let module = HANDLER_FILE.trim_end_matches(".js");
    format!("{}.{}", module, HANDLER_EXPORT)
}

/// Render the entry point source for the flow named `flow_name`
pub fn render_handler(flow_name: &str) -> String {
    let flow_file = format!("{}.json", flow_name).replace('\\', "\\\\").replace('\'', "\\'");
    format!(
        "'use strict';\n\
         const {{ LambdaFlowBuilder }} = require('{runtime}');\n\
         const lambdaFlow = new LambdaFlowBuilder('{flow_file}');\n\
         exports.{export} = lambdaFlow.handler;\n",
        runtime = RUNTIME_PACKAGE,
        flow_file = flow_file,
        export = HANDLER_EXPORT,
    )
}
