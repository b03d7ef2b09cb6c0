//! `ProcessorRouter` — the multi-port, block-based DAG that schedules
//! [`Processor`](crate::Processor) nodes (§4.2).
//!
//! Generalizes [`ProcessingGraph`](super::ProcessingGraph)'s arena-of-nodes,
//! Kahn-sorted scheduling to the new [`Processor`] contract: nodes may have
//! more than one input/output port, buffers are owned directly by each
//! node's [`Output`]s rather than assigned from a shared [`BufferPool`](
//! super::BufferPool), and cycles are resolved by splicing in a one-block-
//! delay `Feedback` node instead of being rejected outright.

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, string::String, vec, vec::Vec};

use crate::poly::PolyFloat;
use crate::processor::{Output, Processor};

use super::node::NodeId;
use super::processing::GraphError;

/// Upper bound on input ports per node. Fixed-size so a node's wiring table
/// is a plain array, not a heap-allocated `Vec`, keeping `connect`/`process`
/// off the allocator.
pub const MAX_INPUTS: usize = 8;

const EMPTY_SLICE: &[PolyFloat] = &[];

/// One slot in the node arena: a boxed processor, its fixed input wiring,
/// and its owned output buffers.
struct Node {
    body: NodeBody,
    num_inputs: usize,
    num_outputs: usize,
    inputs: [Option<(NodeId, usize)>; MAX_INPUTS],
    outputs: Vec<Output>,
}

enum NodeBody {
    Leaf(Box<dyn Processor>),
    /// Placeholder with no real inputs; the router writes its stored value
    /// into `outputs[0]` at the start of each block and refreshes the
    /// stored value from the matching [`FeedbackLink`]'s source at the end,
    /// giving downstream nodes the *previous* block's value (§3 "Feedback
    /// node").
    Feedback { buffer: Vec<PolyFloat> },
}

/// Records a feedback splice made by [`ProcessorRouter::resolve_feedbacks`]
/// so `process_block` knows which nodes need the emit/capture treatment.
struct FeedbackLink {
    node: NodeId,
    source: (NodeId, usize),
}

/// Arena of [`Processor`] nodes wired into a dependency-ordered schedule.
///
/// Mutation (`add_processor`, `connect`, `remove_processor`) and scheduling
/// (`compile`) happen together here rather than being split into a separate
/// mutation/compiled-snapshot pair like [`ProcessingGraph`] — the voice graph
/// this routes is rebuilt wholesale on voice allocation, not mutated
/// continuously while audio runs, so the extra machinery for lock-free
/// snapshot swaps isn't needed.
pub struct ProcessorRouter {
    nodes: Vec<Option<Node>>,
    order: Vec<NodeId>,
    feedback_links: Vec<FeedbackLink>,
    input_scratch: Vec<Vec<PolyFloat>>,
    sample_rate: f32,
    block_size: usize,
    next_slot: u32,
    dirty: bool,
}

impl ProcessorRouter {
    /// Creates an empty router sized for blocks of at most `block_size`
    /// samples at `sample_rate`.
    pub fn new(sample_rate: f32, block_size: usize) -> Self {
        Self {
            nodes: Vec::new(),
            order: Vec::new(),
            feedback_links: Vec::new(),
            input_scratch: (0..MAX_INPUTS).map(|_| vec![PolyFloat::ZERO; block_size]).collect(),
            sample_rate,
            block_size,
            next_slot: 0,
            dirty: true,
        }
    }

    /// Adds a processor to the arena and returns its stable [`NodeId`].
    /// Does not wire any connections; the graph is marked dirty and must be
    /// [`compile`](Self::compile)d again before the next [`process_block`](
    /// Self::process_block).
    pub fn add_processor(&mut self, mut processor: Box<dyn Processor>) -> NodeId {
        processor.set_sample_rate(self.sample_rate);
        let num_inputs = processor.num_inputs();
        let num_outputs = processor.num_outputs();
        debug_assert!(num_inputs <= MAX_INPUTS, "processor exceeds MAX_INPUTS");
        let outputs = (0..num_outputs)
            .map(|i| Output::new(self.block_size, processor.is_control_rate_output(i)))
            .collect();
        let node = Node {
            body: NodeBody::Leaf(processor),
            num_inputs,
            num_outputs,
            inputs: [None; MAX_INPUTS],
            outputs,
        };
        self.push_node(node)
    }

    fn push_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.next_slot);
        self.next_slot += 1;
        self.nodes.push(Some(node));
        self.dirty = true;
        id
    }

    /// Removes a processor and every connection referencing it. Leaves a
    /// hole in the arena (other `NodeId`s stay valid).
    pub fn remove_processor(&mut self, id: NodeId) -> Result<(), GraphError> {
        let idx = id.index() as usize;
        if idx >= self.nodes.len() || self.nodes[idx].is_none() {
            return Err(GraphError::NodeNotFound(id));
        }
        self.nodes[idx] = None;
        for slot in self.nodes.iter_mut().flatten() {
            for input in &mut slot.inputs {
                if matches!(input, Some((src, _)) if *src == id) {
                    *input = None;
                }
            }
        }
        self.feedback_links.retain(|link| link.node != id && link.source.0 != id);
        self.dirty = true;
        Ok(())
    }

    /// Wires `to`'s `to_input`-th port to read from `from`'s `from_output`-th
    /// output. Overwrites any existing connection on that input port.
    pub fn connect(
        &mut self,
        from: NodeId,
        from_output: usize,
        to: NodeId,
        to_input: usize,
    ) -> Result<(), GraphError> {
        let from_idx = from.index() as usize;
        let to_idx = to.index() as usize;
        let from_outputs = self
            .nodes
            .get(from_idx)
            .and_then(Option::as_ref)
            .ok_or(GraphError::NodeNotFound(from))?
            .num_outputs;
        if from_output >= from_outputs {
            return Err(GraphError::InvalidConnection(String::from("output index out of range")));
        }
        let to_node = self
            .nodes
            .get_mut(to_idx)
            .and_then(Option::as_mut)
            .ok_or(GraphError::NodeNotFound(to))?;
        if to_input >= to_node.num_inputs {
            return Err(GraphError::InvalidConnection(String::from("input index out of range")));
        }
        to_node.inputs[to_input] = Some((from, from_output));
        self.dirty = true;
        Ok(())
    }

    /// Clears whatever connection currently feeds `to`'s `to_input`-th port.
    pub fn disconnect(&mut self, to: NodeId, to_input: usize) -> Result<(), GraphError> {
        let to_node = self
            .nodes
            .get_mut(to.index() as usize)
            .and_then(Option::as_mut)
            .ok_or(GraphError::NodeNotFound(to))?;
        if to_input >= to_node.num_inputs {
            return Err(GraphError::InvalidConnection(String::from("input index out of range")));
        }
        to_node.inputs[to_input] = None;
        self.dirty = true;
        Ok(())
    }

    /// Resolves any dependency cycles by splicing a one-block-delay
    /// `Feedback` node into the back-edge, then computes a fresh
    /// dependency-ordered schedule. Must be called after any mutation and
    /// before the next [`process_block`](Self::process_block).
    pub fn compile(&mut self) -> Result<(), GraphError> {
        self.resolve_feedbacks();
        self.order = self.kahn_sort()?;
        self.dirty = false;
        Ok(())
    }

    fn resolve_feedbacks(&mut self) {
        while let Some((dest, dest_input, src, src_output)) = self.find_back_edge() {
            let feedback_id = self.push_node(Node {
                body: NodeBody::Feedback { buffer: vec![PolyFloat::ZERO; self.block_size] },
                num_inputs: 0,
                num_outputs: 1,
                inputs: [None; MAX_INPUTS],
                outputs: vec![Output::new(self.block_size, false)],
            });
            let dest_node = self.nodes[dest.index() as usize].as_mut().unwrap();
            dest_node.inputs[dest_input] = Some((feedback_id, 0));
            self.feedback_links.push(FeedbackLink { node: feedback_id, source: (src, src_output) });
        }
    }

    /// Depth-first search for a back edge (an input that chains back to a
    /// node currently on the DFS stack). Returns `(dest, dest_input, src,
    /// src_output)` for the first one found, or `None` once the graph is
    /// acyclic.
    fn find_back_edge(&self) -> Option<(NodeId, usize, NodeId, usize)> {
        let n = self.nodes.len();
        let mut state = vec![0u8; n];
        for start in 0..n {
            if self.nodes[start].is_none() || state[start] != 0 {
                continue;
            }
            if let Some(edge) = self.dfs_visit(start, &mut state) {
                return Some(edge);
            }
        }
        None
    }

    fn dfs_visit(&self, idx: usize, state: &mut [u8]) -> Option<(NodeId, usize, NodeId, usize)> {
        state[idx] = 1;
        let node = self.nodes[idx].as_ref().unwrap();
        for port in 0..node.num_inputs {
            if let Some((src_id, src_out)) = node.inputs[port] {
                let src_idx = src_id.index() as usize;
                match state[src_idx] {
                    1 => return Some((NodeId(idx as u32), port, src_id, src_out)),
                    0 => {
                        if let Some(edge) = self.dfs_visit(src_idx, state) {
                            return Some(edge);
                        }
                    }
                    _ => {}
                }
            }
        }
        state[idx] = 2;
        None
    }

    /// Kahn's algorithm over the (now acyclic) input-port wiring. Mirrors
    /// [`ProcessingGraph::kahn_sort`](super::processing::ProcessingGraph),
    /// generalized from one `incoming`/`outgoing` edge list per node to
    /// however many input ports a [`Processor`] declares.
    fn kahn_sort(&self) -> Result<Vec<NodeId>, GraphError> {
        let n = self.nodes.len();
        let mut in_degree = vec![0u32; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut active_count = 0usize;

        for (idx, slot) in self.nodes.iter().enumerate() {
            if let Some(node) = slot {
                active_count += 1;
                for port in 0..node.num_inputs {
                    if let Some((src_id, _)) = node.inputs[port] {
                        in_degree[idx] += 1;
                        dependents[src_id.index() as usize].push(idx);
                    }
                }
            }
        }

        if active_count == 0 {
            return Err(GraphError::EmptyGraph);
        }

        let mut queue: Vec<usize> =
            (0..n).filter(|&i| self.nodes[i].is_some() && in_degree[i] == 0).collect();
        let mut sorted = Vec::with_capacity(active_count);

        while let Some(idx) = queue.pop() {
            sorted.push(NodeId(idx as u32));
            for &dep in &dependents[idx] {
                in_degree[dep] -= 1;
                if in_degree[dep] == 0 {
                    queue.push(dep);
                }
            }
        }

        if sorted.len() != active_count {
            return Err(GraphError::CycleDetected);
        }
        Ok(sorted)
    }

    /// Runs one block of `n` samples (`n <= block_size`) through every node
    /// in dependency order. Panics (via `debug_assert`) if called while
    /// [`dirty`](Self::is_dirty) — callers must `compile()` after mutating.
    pub fn process_block(&mut self, n: usize) {
        debug_assert!(!self.dirty, "process_block called on an uncompiled router");
        debug_assert!(n <= self.block_size);

        for link in &self.feedback_links {
            if let Some(node) = self.nodes[link.node.index() as usize].as_mut() {
                if let NodeBody::Feedback { buffer } = &node.body {
                    node.outputs[0].as_mut_slice()[..n].copy_from_slice(&buffer[..n]);
                }
            }
        }

        for &id in &self.order {
            let idx = id.index() as usize;
            let num_inputs = match self.nodes[idx].as_ref() {
                Some(node) if matches!(node.body, NodeBody::Leaf(_)) => node.num_inputs,
                _ => continue,
            };
            let inputs_copy = self.nodes[idx].as_ref().unwrap().inputs;

            for port in 0..num_inputs {
                match inputs_copy[port] {
                    Some((src_id, src_out)) => {
                        let src = self.nodes[src_id.index() as usize].as_ref().unwrap();
                        let src_slice = src.outputs[src_out].as_slice();
                        self.input_scratch[port][..n].copy_from_slice(&src_slice[..n]);
                    }
                    None => {
                        for s in &mut self.input_scratch[port][..n] {
                            *s = PolyFloat::ZERO;
                        }
                    }
                }
            }

            let mut input_refs = [EMPTY_SLICE; MAX_INPUTS];
            for (port, slot) in input_refs.iter_mut().enumerate().take(num_inputs) {
                *slot = &self.input_scratch[port][..n];
            }

            let node = self.nodes[idx].as_mut().unwrap();
            if let NodeBody::Leaf(processor) = &mut node.body {
                processor.process(&input_refs[..num_inputs], &mut node.outputs, n);
            }
        }

        for link in &self.feedback_links {
            let value: Vec<PolyFloat> = {
                let src = self.nodes[link.source.0.index() as usize].as_ref().unwrap();
                src.outputs[link.source.1].as_slice()[..n].to_vec()
            };
            if let Some(node) = self.nodes[link.node.index() as usize].as_mut() {
                if let NodeBody::Feedback { buffer } = &mut node.body {
                    buffer[..n].copy_from_slice(&value);
                }
            }
        }
    }

    /// Reads a node's output buffer after [`process_block`](Self::process_block).
    pub fn output(&self, id: NodeId, index: usize) -> Option<&Output> {
        self.nodes.get(id.index() as usize)?.as_ref()?.outputs.get(index)
    }

    /// Mutable access to a leaf node's boxed processor, e.g. to downcast via
    /// [`Processor::as_any_mut`] and deliver a trigger into a voice-graph
    /// node the caller owns the topology of. `None` for a removed node or a
    /// `Feedback` placeholder (which has no processor to reach).
    pub fn processor_mut(&mut self, id: NodeId) -> Option<&mut dyn Processor> {
        let node = self.nodes.get_mut(id.index() as usize)?.as_mut()?;
        match &mut node.body {
            NodeBody::Leaf(processor) => Some(processor.as_mut()),
            NodeBody::Feedback { .. } => None,
        }
    }

    /// Whether the router needs [`compile`](Self::compile) before the next
    /// [`process_block`](Self::process_block) (a mutation happened since).
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Propagates a new sample rate to every live processor and recomputes
    /// feedback/scratch buffer sizing.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for slot in self.nodes.iter_mut().flatten() {
            if let NodeBody::Leaf(processor) = &mut slot.body {
                processor.set_sample_rate(sample_rate);
            }
        }
    }

    /// Resets every live processor and clears feedback memory for the given
    /// voice lanes.
    pub fn reset(&mut self, mask: crate::poly::PolyMask) {
        for slot in self.nodes.iter_mut().flatten() {
            match &mut slot.body {
                NodeBody::Leaf(processor) => processor.reset(mask),
                NodeBody::Feedback { buffer } => {
                    for sample in buffer.iter_mut() {
                        *sample = sample.masked_select(mask, PolyFloat::ZERO);
                    }
                }
            }
        }
    }

    /// Hard-resets every live processor (used after an oversample factor
    /// change per §4.6).
    pub fn hard_reset(&mut self) {
        for slot in self.nodes.iter_mut().flatten() {
            match &mut slot.body {
                NodeBody::Leaf(processor) => processor.hard_reset(),
                NodeBody::Feedback { buffer } => {
                    for sample in buffer.iter_mut() {
                        *sample = PolyFloat::ZERO;
                    }
                }
            }
        }
    }
}
