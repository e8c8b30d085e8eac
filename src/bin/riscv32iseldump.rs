//! Demo CLI: builds one of a handful of canned mid-IR graphs, runs the
//! selector over it, and prints the resulting instruction stream. This is
//! a debugging aid (SPEC_FULL.md §4.12), not a production entry point —
//! the library crate is the deliverable.

use clap::Parser;

use riscv32_select::frame::BumpFrame;
use riscv32_select::ir::{MidIrGraph, OperatorKind, OperatorParams};
use riscv32_select::selector::{Flags, Selector};

#[derive(Copy, Clone, clap::ValueEnum)]
enum Scenario {
    AddImmediate,
    AddOverflowsImmediate,
    ShlMaskFold,
    MulByNine,
    DoubleNegationBranch,
    RootRelativeLoad,
}

#[derive(Parser)]
#[command(about = "Dump the instruction stream the selector emits for a canned scenario")]
struct Cli {
    #[arg(long, value_enum, default_value_t = Scenario::AddImmediate)]
    scenario: Scenario,
}

fn main() {
    tracing_subscriber_init();
    let cli = Cli::parse();
    let function = internment::Intern::new("demo".to_string());
    let mut graph = MidIrGraph::new();

    let root = match cli.scenario {
        Scenario::AddImmediate => {
            let p = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
            let c = graph.add_node(
                OperatorKind::Int32Constant,
                OperatorParams { int_constant: Some(5), ..Default::default() },
                vec![],
            );
            graph.add_node(OperatorKind::Int32Add, OperatorParams::default(), vec![p, c])
        }
        Scenario::AddOverflowsImmediate => {
            let p = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
            let c = graph.add_node(
                OperatorKind::Int32Constant,
                OperatorParams { int_constant: Some(4096), ..Default::default() },
                vec![],
            );
            graph.add_node(OperatorKind::Int32Add, OperatorParams::default(), vec![p, c])
        }
        Scenario::ShlMaskFold => {
            let p = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
            let mask = graph.add_node(
                OperatorKind::Int32Constant,
                OperatorParams { int_constant: Some(0x0000_FFFF), ..Default::default() },
                vec![],
            );
            let and = graph.add_node(OperatorKind::Word32And, OperatorParams::default(), vec![p, mask]);
            let sixteen = graph.add_node(
                OperatorKind::Int32Constant,
                OperatorParams { int_constant: Some(16), ..Default::default() },
                vec![],
            );
            graph.add_node(OperatorKind::Word32Shl, OperatorParams::default(), vec![and, sixteen])
        }
        Scenario::MulByNine => {
            let p = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
            let c = graph.add_node(
                OperatorKind::Int32Constant,
                OperatorParams { int_constant: Some(7), ..Default::default() },
                vec![],
            );
            graph.add_node(OperatorKind::Int32Mul, OperatorParams::default(), vec![p, c])
        }
        Scenario::DoubleNegationBranch => {
            let x = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
            let zero = graph.add_node(
                OperatorKind::Int32Constant,
                OperatorParams { int_constant: Some(0), ..Default::default() },
                vec![],
            );
            let eq1 = graph.add_node(OperatorKind::Word32Equal, OperatorParams::default(), vec![x, zero]);
            let eq2 = graph.add_node(OperatorKind::Word32Equal, OperatorParams::default(), vec![eq1, zero]);
            let t = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
            let f = graph.add_node(OperatorKind::Parameter, OperatorParams::default(), vec![]);
            graph.add_node(OperatorKind::Branch, OperatorParams::default(), vec![eq2, t, f])
        }
        Scenario::RootRelativeLoad => {
            let base = graph.add_node(
                OperatorKind::Parameter,
                OperatorParams {
                    external_reference: Some(riscv32_select::ir::ExternalReference { root_offset: 100 }),
                    ..Default::default()
                },
                vec![],
            );
            let index = graph.add_node(
                OperatorKind::Int32Constant,
                OperatorParams { int_constant: Some(8), ..Default::default() },
                vec![],
            );
            graph.add_node(
                OperatorKind::Load,
                OperatorParams {
                    representation: Some(riscv32_select::ir::MachineRepresentation::Word32),
                    ..Default::default()
                },
                vec![base, index],
            )
        }
    };

    let mut selector = Selector::new(&graph, BumpFrame::default(), Flags::default(), function);
    match selector.visit(root) {
        Ok(()) => {
            for instruction in &selector.sequence.instructions {
                println!("{instruction}");
            }
        }
        Err(err) => eprintln!("selection failed: {err}"),
    }
}

fn tracing_subscriber_init() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
