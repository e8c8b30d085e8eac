//! The mid-level IR this pass consumes.
//!
//! The mid-IR builder and the optimization passes that produce this graph are
//! external collaborators (see the crate root docs); this module defines only
//! the narrow read-only view the selector needs, plus an in-memory graph the
//! selector can be driven and tested against.

use std::cell::RefCell;

use crate::common::{Id, Map};

/// Machine representation of a value flowing through a load, store, or
/// constant. Mirrors the "Representation" column of the load/store table.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum MachineRepresentation {
    Float32,
    Float64,
    Word8,
    Word16,
    Word32,
    TaggedSigned,
    TaggedPointer,
    Simd128,
    /// Rejected at selection time: compressed pointers, 64-bit words,
    /// sandboxed pointers, and map words are not supported on this target.
    Compressed,
    Word64,
    SandboxedPointer,
    MapWord,
}

impl MachineRepresentation {
    pub fn is_unsupported(self) -> bool {
        matches!(
            self,
            MachineRepresentation::Compressed
                | MachineRepresentation::Word64
                | MachineRepresentation::SandboxedPointer
                | MachineRepresentation::MapWord
        )
    }
}

/// Whether a write needs a GC write barrier, and if so which kind.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum WriteBarrierKind {
    None,
    Map,
    Pointer,
    Full,
}

/// Lane width tag used by SIMD load-transform/load-lane/store-lane rules.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum LaneWidth {
    E8,
    E16,
    E32,
    E64,
}

/// Vector group multiplier used alongside [`LaneWidth`] for RVV encodings.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Lmul {
    Mf2,
    M1,
    M2,
}

/// An external reference resolved (by the host VM) to a fixed offset from
/// the root register. Out of scope to compute; this pass only consumes it.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct ExternalReference {
    pub root_offset: i64,
}

/// Per-node operator parameters. Only the fields relevant to the rules this
/// pass implements are modeled; everything else is carried as an opaque tag
/// for the catch-all arm.
#[derive(Clone, Debug, Default)]
pub struct OperatorParams {
    pub int_constant: Option<i64>,
    pub float_bits: Option<u64>,
    pub representation: Option<MachineRepresentation>,
    pub write_barrier: Option<WriteBarrierKind>,
    pub external_reference: Option<ExternalReference>,
    pub lane: Option<u8>,
    pub lane_width: Option<LaneWidth>,
    pub lmul: Option<Lmul>,
    pub shuffle: Option<[u8; 16]>,
    pub condition: Option<crate::flags::Condition>,
    pub trap_id: Option<u32>,
    /// Sign-extension mode for sub-word loads (§4.2.2's signed/unsigned
    /// load columns). Irrelevant to stores and full-word representations.
    pub signed: bool,
}

/// The ~400-entry mid-IR operator vocabulary (see SPEC_FULL.md §3.1): every
/// kind named explicitly by this pass's selection rules is its own variant;
/// everything else falls into [`OperatorKind::Other`] and is rejected by the
/// catch-all unimplemented arm, preserving total, closed-form dispatch.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum OperatorKind {
    Parameter,
    Int32Constant,
    Float32Constant,
    Float64Constant,

    Int32Add,
    Int32Sub,
    Int32Mul,
    Word32And,
    Word32Or,
    Word32Xor,
    Word32Shl,
    Word32Sar,
    Word32Shr,
    Int32Div,
    Uint32Div,
    Int32Mod,
    Uint32Mod,

    Int32AddWithOverflow,
    Int32SubWithOverflow,
    Int32MulWithOverflow,
    Projection,

    Load,
    Store,
    UnalignedLoad,
    UnalignedStore,

    Word32Equal,
    Int32LessThan,
    Int32LessThanOrEqual,
    Uint32LessThan,
    Uint32LessThanOrEqual,
    Float32Equal,
    Float32LessThan,
    Float32LessThanOrEqual,
    Float64Equal,
    Float64LessThan,
    Float64LessThanOrEqual,
    StackPointerGreaterThan,

    Branch,
    DeoptimizeIf,
    TrapIf,

    Switch,

    Word32AtomicLoad,
    Word32AtomicStore,
    Word32AtomicExchange,
    Word32AtomicCompareExchange,
    Word32AtomicAdd,
    Word32AtomicSub,
    Word32AtomicAnd,
    Word32AtomicOr,
    Word32AtomicXor,

    Word32AtomicPairLoad,
    Word32AtomicPairStore,
    Word32AtomicPairAdd,
    Word32AtomicPairSub,
    Word32AtomicPairAnd,
    Word32AtomicPairOr,
    Word32AtomicPairXor,
    Word32AtomicPairExchange,
    Word32AtomicPairCompareExchange,

    Int32PairAdd,
    Int32PairSub,
    Int32PairMul,
    Word32PairShl,
    Word32PairShr,
    Word32PairSar,

    F32x4Add,
    F32x4Sub,
    I32x4Add,
    I32x4Sub,
    I32x4Shl,
    I8x16Swizzle,
    I8x16Shuffle,
    S128Const,
    S128Zero,
    S128AllOnes,
    I16x8ExtMulLowI8x16S,
    I16x8ExtMulHighI8x16S,
    I16x8ExtMulLowI8x16U,
    I16x8ExtMulHighI8x16U,
    I32x4ExtMulLowI16x8S,
    I32x4ExtMulHighI16x8S,
    I32x4ExtMulLowI16x8U,
    I32x4ExtMulHighI16x8U,
    I64x2ExtMulLowI32x4S,
    I64x2ExtMulHighI32x4S,
    I64x2ExtMulLowI32x4U,
    I64x2ExtMulHighI32x4U,
    S128LoadSplat,
    S128Load32Zero,
    S128Load64Zero,
    S128Load64ExtendS,
    S128Load64ExtendU,
    S128LoadLane,
    S128StoreLane,

    Call,
    CallC,
    Return,

    ProtectedLoad,
    ProtectedStore,
    Float64RoundDown,
    Float64RoundUp,
    Float64RoundTruncate,
    Float64RoundTiesEven,
    Float64RoundTiesAway,
    Word32Rol,
    Word32ReverseBits,
    Word64ReverseBytes,
    Simd128ReverseBytes,
    Int32AbsWithOverflow,
    Int64AbsWithOverflow,

    /// Anything outside the named vocabulary above. Always unimplemented.
    Other(&'static str),
}

/// Opaque identifier into the surrounding mid-IR graph.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Node(pub u32);

#[derive(Clone, Debug)]
pub struct NodeData {
    pub opcode: OperatorKind,
    pub params: OperatorParams,
    pub inputs: Vec<Node>,
}

/// An in-memory mid-IR graph, built directly by tests and the demo CLI. The
/// real graph and its builder live outside this crate; this is the test
/// double for the narrow read interface described in SPEC_FULL.md §6.
#[derive(Clone, Debug, Default)]
pub struct MidIrGraph {
    nodes: Map<Node, NodeData>,
    /// Secondary outputs: (defining node, projection index) -> node.
    projections: Map<(Node, u32), Node>,
    /// Number of consumers of each node, used to implement `can_cover`.
    use_counts: Map<Node, u32>,
    next_id: u32,
}

impl MidIrGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, opcode: OperatorKind, params: OperatorParams, inputs: Vec<Node>) -> Node {
        let id = Node(self.next_id);
        self.next_id += 1;
        for input in &inputs {
            *self.use_counts.entry(*input).or_insert(0) += 1;
        }
        self.nodes.insert(id, NodeData { opcode, params, inputs });
        id
    }

    pub fn add_projection(&mut self, of: Node, index: u32) -> Node {
        let id = self.add_node(OperatorKind::Projection, OperatorParams::default(), vec![of]);
        self.projections.insert((of, index), id);
        id
    }

    pub fn opcode(&self, n: Node) -> OperatorKind {
        self.nodes[&n].opcode
    }

    pub fn params(&self, n: Node) -> &OperatorParams {
        &self.nodes[&n].params
    }

    pub fn input(&self, n: Node, i: usize) -> Node {
        self.nodes[&n].inputs[i]
    }

    pub fn inputs(&self, n: Node) -> &[Node] {
        &self.nodes[&n].inputs
    }

    pub fn find_projection(&self, n: Node, index: u32) -> Option<Node> {
        self.projections.get(&(n, index)).copied()
    }

    pub fn int_constant(&self, n: Node) -> Option<i64> {
        if matches!(self.opcode(n), OperatorKind::Int32Constant) {
            self.params(n).int_constant
        } else {
            None
        }
    }

    /// A node may be folded into its user only if the user is its sole
    /// consumer. This is the sole authority for peephole folding (§9).
    pub fn can_cover(&self, _user: Node, value: Node) -> bool {
        self.use_counts.get(&value).copied().unwrap_or(0) <= 1
    }
}

/// Tracks which nodes have already produced a virtual register, so the
/// driver (external to this pass) can skip redundant visits. Interior
/// mutability mirrors how a single-pass walker marks nodes as it goes
/// without needing `&mut self` at every call site.
#[derive(Default)]
pub struct DefinedSet {
    defined: RefCell<Map<Node, ()>>,
}

impl DefinedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_defined(&self, n: Node) -> bool {
        self.defined.borrow().contains_key(&n)
    }

    pub fn mark_defined(&self, n: Node) {
        self.defined.borrow_mut().insert(n, ());
    }
}

/// Function name table, used only for diagnostics (`Id` is the teacher's
/// interned-string identifier type, reused here for symbol names).
pub type FunctionName = Id;
