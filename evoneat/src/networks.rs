//! The phenotype: a network expanded from a genome, activated
//! synchronously one propagation pass at a time.
//!
//! Nodes and links live in flat arenas and refer to each other by
//! index, which keeps activation cache-friendly and avoids ownership
//! cycles between nodes and their links.

mod errors;
mod nodes;

pub use errors::NetworkError;
pub use nodes::{Link, NNode};

use crate::activations::{ActivationKind, ModuleActivationKind};
use crate::genomics::NodeKind;
use crate::NodeId;

/// Number of propagation passes [`Network::activate`] allows before
/// reporting an activation overrun.
const DEFAULT_ACTIVATION_ATTEMPTS: usize = 20;

/// A network of nodes and links expanded from a genome. Handles
/// feedforward, recurrent and modular graphs.
///
/// Sensors expose externally loaded values; every other node computes
/// the weighted sum of its incoming links and applies its activation.
/// A recurrent link reads its source's previous-pass output, which the
/// network promotes into a time-delayed slot after every pass.
#[derive(Clone, Debug)]
pub struct Network {
    id: usize,
    nodes: Vec<NNode>,
    links: Vec<Link>,
    inputs: Vec<usize>,
    outputs: Vec<usize>,
    control_nodes: Vec<usize>,
}

impl Network {
    /// Creates an empty network.
    pub fn new(id: usize) -> Network {
        Network {
            id,
            nodes: Vec::new(),
            links: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            control_nodes: Vec::new(),
        }
    }

    /// Returns the network's ID.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Adds a node and returns its arena index. Sensor and bias nodes
    /// are registered as inputs, output nodes as outputs, in
    /// insertion order.
    pub fn add_node(
        &mut self,
        id: NodeId,
        kind: NodeKind,
        activation: ActivationKind,
    ) -> usize {
        let index = self.nodes.len();
        self.nodes.push(NNode::new(id, kind, activation));
        match kind {
            NodeKind::Sensor | NodeKind::Bias => self.inputs.push(index),
            NodeKind::Output => self.outputs.push(index),
            NodeKind::Hidden => {}
        }
        index
    }

    /// Adds a link between two nodes and returns its arena index.
    pub fn connect(&mut self, source: usize, target: usize, weight: f64) -> usize {
        self.add_link(source, target, weight, false)
    }

    /// Adds a recurrent link between two nodes and returns its arena
    /// index.
    pub fn connect_recurrent(&mut self, source: usize, target: usize, weight: f64) -> usize {
        self.add_link(source, target, weight, true)
    }

    fn add_link(&mut self, source: usize, target: usize, weight: f64, recurrent: bool) -> usize {
        let index = self.links.len();
        self.links.push(Link {
            source,
            target,
            weight,
            recurrent,
        });
        self.nodes[source].outgoing.push(index);
        self.nodes[target].incoming.push(index);
        index
    }

    /// Adds a module control node with its incoming and outgoing
    /// module links, given as `(base node index, weight)` pairs, and
    /// returns its arena index. Module targets are driven by the
    /// module from then on.
    pub fn add_control_node(
        &mut self,
        id: NodeId,
        module: ModuleActivationKind,
        incoming: &[(usize, f64)],
        outgoing: &[(usize, f64)],
    ) -> usize {
        let index = self.nodes.len();
        let mut node = NNode::new(id, NodeKind::Hidden, ActivationKind::Null);
        node.module = Some(module);
        self.nodes.push(node);
        self.control_nodes.push(index);
        for &(source, weight) in incoming {
            self.add_link(source, index, weight, false);
        }
        for &(target, weight) in outgoing {
            self.add_link(index, target, weight, false);
            self.nodes[target].module_driven = true;
        }
        index
    }

    /// Returns the nodes of the network, control nodes last.
    pub fn nodes(&self) -> &[NNode] {
        &self.nodes
    }

    /// Returns the links of the network, module links included.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Returns the total node count, control nodes included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the total link count, module links included.
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Returns the number of module control nodes.
    pub fn control_node_count(&self) -> usize {
        self.control_nodes.len()
    }

    /// Returns whether the network contains module control nodes.
    pub fn is_modular(&self) -> bool {
        !self.control_nodes.is_empty()
    }

    /// Returns the arena index of the node expanded from the given
    /// genome node ID.
    pub fn node_index_of(&self, id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    /// Assigns values to the input and bias nodes in their resident
    /// order.
    ///
    /// # Errors
    /// Fails with [`NetworkError::SensorArityMismatch`] unless exactly
    /// one value per input node is supplied.
    pub fn load_sensors(&mut self, values: &[f64]) -> Result<(), NetworkError> {
        if values.len() != self.inputs.len() {
            return Err(NetworkError::SensorArityMismatch {
                expected: self.inputs.len(),
                actual: values.len(),
            });
        }
        for (&index, &value) in self.inputs.iter().zip(values) {
            let node = &mut self.nodes[index];
            node.activation = value;
            node.activations_count += 1;
        }
        Ok(())
    }

    /// Returns the current activations of the output nodes in their
    /// resident order.
    pub fn read_outputs(&self) -> Vec<f64> {
        self.outputs
            .iter()
            .map(|&index| self.nodes[index].activation)
            .collect()
    }

    /// Returns true iff some output node has not activated since the
    /// last flush.
    pub fn output_is_off(&self) -> bool {
        self.outputs
            .iter()
            .any(|&index| self.nodes[index].activations_count == 0)
    }

    /// Propagates activation until every output node has activated,
    /// running at most [`DEFAULT_ACTIVATION_ATTEMPTS`] passes and at
    /// least one.
    pub fn activate(&mut self) -> Result<(), NetworkError> {
        self.activate_steps(DEFAULT_ACTIVATION_ATTEMPTS)
    }

    /// Propagates activation until every output node has activated,
    /// running at most `max_steps` passes and at least one.
    ///
    /// # Errors
    /// Fails with [`NetworkError::ZeroStepsRequested`] when `max_steps`
    /// is zero, and [`NetworkError::MaxActivationAttemptsExceeded`]
    /// when some output is still off after `max_steps` passes.
    pub fn activate_steps(&mut self, max_steps: usize) -> Result<(), NetworkError> {
        if max_steps == 0 {
            return Err(NetworkError::ZeroStepsRequested);
        }
        let mut attempts = 0;
        let mut once = false;
        while self.output_is_off() || !once {
            if attempts >= max_steps {
                return Err(NetworkError::MaxActivationAttemptsExceeded);
            }
            attempts += 1;
            self.propagation_pass();
            once = true;
        }
        Ok(())
    }

    /// Propagates activation through exactly `steps` passes, as needed
    /// to drive a signal through a feedforward network of that depth.
    ///
    /// # Errors
    /// Fails with [`NetworkError::ZeroStepsRequested`] when `steps` is
    /// zero, and [`NetworkError::MaxActivationAttemptsExceeded`] when
    /// some output is still off afterwards.
    pub fn forward_steps(&mut self, steps: usize) -> Result<(), NetworkError> {
        if steps == 0 {
            return Err(NetworkError::ZeroStepsRequested);
        }
        for _ in 0..steps {
            self.propagation_pass();
        }
        if self.output_is_off() {
            return Err(NetworkError::MaxActivationAttemptsExceeded);
        }
        Ok(())
    }

    /// Relaxes the network over as many passes as its maximal
    /// activation depth, so recurrent links (which read time-delayed
    /// outputs) settle toward a fixed point.
    ///
    /// # Errors
    /// Fails with [`NetworkError::MaxActivationAttemptsExceeded`] when
    /// no path connects the inputs to the outputs.
    pub fn recursive_steps(&mut self) -> Result<(), NetworkError> {
        let depth = self.max_activation_depth();
        if depth == 0 {
            return Err(NetworkError::MaxActivationAttemptsExceeded);
        }
        self.forward_steps(depth)
    }

    /// One synchronous propagation pass: compute the incoming sums of
    /// every neuron from the current outputs (time-delayed for
    /// recurrent links), activate the neurons that received input
    /// from an active source, drive module targets, then promote
    /// outputs into the time-delayed slot.
    fn propagation_pass(&mut self) {
        for i in 0..self.nodes.len() {
            if !self.nodes[i].is_neuron() || self.nodes[i].module_driven {
                continue;
            }
            let mut sum = 0.0;
            let mut active = self.nodes[i].active;
            for k in 0..self.nodes[i].incoming.len() {
                let link = self.links[self.nodes[i].incoming[k]].clone();
                if self.nodes[link.source].module.is_some() {
                    continue;
                }
                if link.recurrent {
                    sum += link.weight * self.nodes[link.source].active_out_td;
                } else {
                    sum += link.weight * self.nodes[link.source].active_out();
                    if self.nodes[link.source].active || self.nodes[link.source].is_sensor() {
                        active = true;
                    }
                }
            }
            self.nodes[i].activation_sum = sum;
            self.nodes[i].active = active;
        }

        for node in &mut self.nodes {
            if node.is_neuron() && !node.module_driven && node.active {
                node.activation = node.activation_kind.apply(node.activation_sum);
                node.activations_count += 1;
            }
        }

        for c in 0..self.control_nodes.len() {
            let index = self.control_nodes[c];
            let module = match self.nodes[index].module {
                Some(module) => module,
                None => continue,
            };
            let module_inputs: Vec<f64> = self.nodes[index]
                .incoming
                .iter()
                .map(|&li| self.nodes[self.links[li].source].active_out())
                .collect();
            let outgoing = self.nodes[index].outgoing.clone();
            let module_outputs = module.apply(&module_inputs, outgoing.len());
            for (&li, value) in outgoing.iter().zip(&module_outputs) {
                let target = self.links[li].target;
                let node = &mut self.nodes[target];
                node.activation_sum = *value;
                node.activation = node.activation_kind.apply(*value);
                node.activations_count += 1;
                node.active = true;
            }
            let control = &mut self.nodes[index];
            control.activation = module_outputs.first().copied().unwrap_or(0.0);
            control.activations_count += 1;
            control.active = true;
        }

        for node in &mut self.nodes {
            node.active_out_td = node.active_out();
        }
    }

    /// Resets activation, activation count and the time-delayed
    /// output on every node.
    pub fn flush(&mut self) {
        for node in &mut self.nodes {
            node.flush();
        }
    }

    /// The deepest path from any input to any output, counted in
    /// links. A network with neither hidden nor control nodes has
    /// depth 1. Computed by depth-first search backward from the
    /// outputs; cycles contribute nothing past their first traversal,
    /// and sensors terminate a path.
    pub fn max_activation_depth(&self) -> usize {
        if self.control_nodes.is_empty()
            && self
                .nodes
                .iter()
                .all(|n| n.is_sensor() || n.kind() == NodeKind::Output)
        {
            return 1;
        }
        let mut path = vec![false; self.nodes.len()];
        self.outputs
            .iter()
            .map(|&o| self.path_depth(o, &mut path))
            .max()
            .unwrap_or(0)
    }

    fn path_depth(&self, index: usize, path: &mut [bool]) -> usize {
        path[index] = true;
        let mut best = 0;
        for &li in &self.nodes[index].incoming {
            let source = self.links[li].source;
            let contribution = if self.nodes[source].is_sensor() {
                1
            } else if path[source] {
                0
            } else {
                match self.path_depth(source, path) {
                    0 => 0,
                    depth => depth + 1,
                }
            };
            best = best.max(contribution);
        }
        path[index] = false;
        best
    }

    /// Depth analysis by relaxation over non-recurrent links, faster
    /// than the path search on large feedforward graphs.
    ///
    /// # Errors
    /// Fails with [`NetworkError::ModularDepthUnsupported`] on
    /// networks with control nodes, and
    /// [`NetworkError::MaxNetDepthExceeded`] once any node's depth
    /// reaches a positive `cap`.
    pub fn max_activation_depth_fast(&self, cap: usize) -> Result<usize, NetworkError> {
        if self.is_modular() {
            return Err(NetworkError::ModularDepthUnsupported);
        }
        if self
            .nodes
            .iter()
            .all(|n| n.is_sensor() || n.kind() == NodeKind::Output)
        {
            return Ok(1);
        }
        let mut depth = vec![0usize; self.nodes.len()];
        for _ in 0..self.nodes.len() {
            let mut changed = false;
            for link in &self.links {
                if link.recurrent {
                    continue;
                }
                let candidate = depth[link.source] + 1;
                if candidate > depth[link.target] {
                    if cap > 0 && candidate >= cap {
                        return Err(NetworkError::MaxNetDepthExceeded);
                    }
                    depth[link.target] = candidate;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        Ok(self
            .outputs
            .iter()
            .map(|&o| depth[o])
            .max()
            .unwrap_or(0))
    }

    /// Detects whether a link from `from` to `to` would be recurrent,
    /// by walking `from`'s non-recurrent incoming links upstream
    /// looking for `to`. `visited` counts nodes touched; the walk
    /// gives up past `cap`.
    pub fn is_recurrent(
        &self,
        from: usize,
        to: usize,
        visited: &mut usize,
        cap: usize,
    ) -> bool {
        *visited += 1;
        if *visited > cap {
            return false;
        }
        if from == to {
            return true;
        }
        for &li in &self.nodes[from].incoming {
            let link = &self.links[li];
            if !link.recurrent && self.is_recurrent(link.source, to, visited, cap) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_plain_network() -> Network {
        let mut net = Network::new(0);
        let n1 = net.add_node(1, NodeKind::Sensor, ActivationKind::SigmoidSteepened);
        let n2 = net.add_node(2, NodeKind::Sensor, ActivationKind::SigmoidSteepened);
        let n3 = net.add_node(3, NodeKind::Bias, ActivationKind::SigmoidSteepened);
        let n7 = net.add_node(7, NodeKind::Output, ActivationKind::SigmoidSteepened);
        let n8 = net.add_node(8, NodeKind::Output, ActivationKind::SigmoidSteepened);
        net.connect(n1, n7, 7.0);
        net.connect(n2, n7, 4.5);
        net.connect(n3, n8, 13.0);
        net
    }

    fn build_disconnected_network() -> Network {
        let mut net = Network::new(0);
        for id in 1..=2 {
            net.add_node(id, NodeKind::Sensor, ActivationKind::SigmoidSteepened);
        }
        net.add_node(3, NodeKind::Bias, ActivationKind::SigmoidSteepened);
        for id in 4..=6 {
            net.add_node(id, NodeKind::Hidden, ActivationKind::SigmoidSteepened);
        }
        for id in 7..=8 {
            net.add_node(id, NodeKind::Output, ActivationKind::SigmoidSteepened);
        }
        net
    }

    fn build_network() -> Network {
        let mut net = Network::new(0);
        let n1 = net.add_node(1, NodeKind::Sensor, ActivationKind::SigmoidSteepened);
        let n2 = net.add_node(2, NodeKind::Sensor, ActivationKind::SigmoidSteepened);
        let n3 = net.add_node(3, NodeKind::Bias, ActivationKind::SigmoidSteepened);
        let n4 = net.add_node(4, NodeKind::Hidden, ActivationKind::SigmoidSteepened);
        let n5 = net.add_node(5, NodeKind::Hidden, ActivationKind::SigmoidSteepened);
        let n6 = net.add_node(6, NodeKind::Hidden, ActivationKind::SigmoidSteepened);
        let n7 = net.add_node(7, NodeKind::Output, ActivationKind::SigmoidSteepened);
        let n8 = net.add_node(8, NodeKind::Output, ActivationKind::SigmoidSteepened);
        net.connect(n1, n4, 15.0);
        net.connect(n2, n4, 10.0);
        net.connect(n2, n5, 5.0);
        net.connect(n3, n5, 1.0);
        net.connect(n5, n6, 17.0);
        net.connect(n4, n7, 7.0);
        net.connect(n6, n7, 4.5);
        net.connect(n6, n8, 13.0);
        net
    }

    fn build_modular_network() -> Network {
        let mut net = Network::new(0);
        let n1 = net.add_node(1, NodeKind::Sensor, ActivationKind::SigmoidSteepened);
        let n2 = net.add_node(2, NodeKind::Sensor, ActivationKind::SigmoidSteepened);
        let n3 = net.add_node(3, NodeKind::Bias, ActivationKind::SigmoidSteepened);
        let n4 = net.add_node(4, NodeKind::Hidden, ActivationKind::Linear);
        let n5 = net.add_node(5, NodeKind::Hidden, ActivationKind::Linear);
        let n7 = net.add_node(7, NodeKind::Hidden, ActivationKind::Null);
        let n8 = net.add_node(8, NodeKind::Output, ActivationKind::Linear);
        let n9 = net.add_node(9, NodeKind::Output, ActivationKind::Linear);
        net.connect(n1, n4, 15.0);
        net.connect(n3, n4, 10.0);
        net.connect(n2, n5, 5.0);
        net.connect(n3, n5, 1.0);
        net.connect(n7, n8, 4.5);
        net.connect(n7, n9, 13.0);
        net.add_control_node(
            6,
            ModuleActivationKind::Multiply,
            &[(n4, 1.0), (n5, 1.0)],
            &[(n7, 1.0)],
        );
        net
    }

    #[test]
    fn modular_activation() {
        let mut net = build_modular_network();
        net.load_sensors(&[1.0, 2.0, 1.0]).unwrap();
        for _ in 0..5 {
            net.activate().unwrap();
        }
        assert_eq!(net.read_outputs(), vec![1237.5, 3575.0]);
    }

    #[test]
    fn max_activation_depth_simple() {
        assert_eq!(build_network().max_activation_depth(), 3);
    }

    #[test]
    fn max_activation_depth_modular() {
        assert_eq!(build_modular_network().max_activation_depth(), 4);
    }

    #[test]
    fn max_activation_depth_no_hidden_or_control() {
        assert_eq!(build_plain_network().max_activation_depth(), 1);
    }

    #[test]
    fn max_activation_depth_fast_simple() {
        assert_eq!(build_network().max_activation_depth_fast(0).unwrap(), 3);
    }

    #[test]
    fn max_activation_depth_fast_with_limit() {
        assert_eq!(
            build_network().max_activation_depth_fast(2),
            Err(NetworkError::MaxNetDepthExceeded)
        );
    }

    #[test]
    fn max_activation_depth_fast_modular_unsupported() {
        assert_eq!(
            build_modular_network().max_activation_depth_fast(0),
            Err(NetworkError::ModularDepthUnsupported)
        );
    }

    #[test]
    fn max_activation_depth_negative_cycle() {
        let mut net = build_network();
        net.connect(7, 1, -130.0);
        assert_eq!(net.max_activation_depth(), 3);
    }

    #[test]
    fn max_activation_depth_disconnected() {
        assert_eq!(build_disconnected_network().max_activation_depth(), 0);
    }

    #[test]
    fn output_is_off_before_activation() {
        assert!(build_network().output_is_off());
    }

    #[test]
    fn activate_sets_every_neuron() {
        let mut net = build_network();
        net.activate().unwrap();
        assert!(!net.output_is_off());
        for node in net.nodes() {
            if !node.is_sensor() {
                assert_ne!(node.activations_count(), 0, "node {}", node.id());
                assert_ne!(node.activation(), 0.0, "node {}", node.id());
                assert_ne!(node.active_out(), 0.0, "node {}", node.id());
            }
        }
    }

    #[test]
    fn activate_steps_with_loaded_sensors() {
        let mut net = build_network();
        net.load_sensors(&[1.0, 1.0, 1.0]).unwrap();
        net.activate_steps(3).unwrap();
        assert!(!net.output_is_off());
        for output in net.read_outputs() {
            assert!(output > 0.0);
        }
    }

    #[test]
    fn forward_steps_drives_outputs() {
        let mut net = build_network();
        net.forward_steps(3).unwrap();
        assert_eq!(net.read_outputs(), vec![1.0, 1.0]);

        assert_eq!(net.forward_steps(0), Err(NetworkError::ZeroStepsRequested));
    }

    #[test]
    fn forward_steps_disconnected() {
        let mut net = build_disconnected_network();
        assert_eq!(
            net.forward_steps(3),
            Err(NetworkError::MaxActivationAttemptsExceeded)
        );
    }

    #[test]
    fn recursive_steps_relaxes() {
        let mut net = build_network();
        net.load_sensors(&[0.5, 0.0, 1.5]).unwrap();
        net.recursive_steps().unwrap();
        assert_eq!(net.read_outputs(), vec![1.0, 1.0]);
    }

    #[test]
    fn recursive_steps_with_recurrent_link() {
        let mut net = build_network();
        net.connect(7, 1, -130.0);
        net.load_sensors(&[1.0, 1.0, 1.0]).unwrap();
        net.recursive_steps().unwrap();
        assert_eq!(net.read_outputs(), vec![1.0, 1.0]);
    }

    #[test]
    fn load_sensors_assigns_in_resident_order() {
        let mut net = build_network();
        let sensors = [1.0, 3.4, 5.6];
        net.load_sensors(&sensors).unwrap();
        let mut counter = 0;
        for node in net.nodes() {
            if node.is_sensor() {
                assert_eq!(node.activation(), sensors[counter]);
                assert_eq!(node.activations_count(), 1);
                counter += 1;
            }
        }
        assert_eq!(counter, 3);
    }

    #[test]
    fn load_sensors_arity_mismatch() {
        let mut net = build_network();
        assert_eq!(
            net.load_sensors(&[1.0, 2.0]),
            Err(NetworkError::SensorArityMismatch {
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn flush_resets_every_node() {
        let mut net = build_network();
        net.load_sensors(&[1.0, 1.0, 1.0]).unwrap();
        net.activate().unwrap();
        net.flush();
        for node in net.nodes() {
            assert_eq!(node.activations_count(), 0);
            assert_eq!(node.activation(), 0.0);
            assert_eq!(node.active_out(), 0.0);
            assert_eq!(node.active_out_td(), 0.0);
        }
    }

    #[test]
    fn node_and_link_counts() {
        let net = build_network();
        assert_eq!(net.node_count(), 8);
        assert_eq!(net.link_count(), 8);

        let modular = build_modular_network();
        assert_eq!(modular.node_count(), 9);
        assert_eq!(modular.link_count(), 9);
        assert_eq!(modular.control_node_count(), 1);
        assert!(modular.is_modular());
    }

    #[test]
    fn recurrency_probe() {
        let mut net = build_network();
        let mut visited = 0;
        assert!(!net.is_recurrent(0, 7, &mut visited, 32));
        assert_eq!(visited, 1);

        net.connect(7, 4, 3.0);
        visited = 0;
        assert!(net.is_recurrent(5, 7, &mut visited, 32));
        assert_eq!(visited, 5);
    }

    #[test]
    fn activate_steps_zero_and_overrun() {
        let mut net = build_network();
        assert_eq!(net.activate_steps(0), Err(NetworkError::ZeroStepsRequested));

        let mut disconnected = build_disconnected_network();
        assert_eq!(
            disconnected.activate_steps(10),
            Err(NetworkError::MaxActivationAttemptsExceeded)
        );
    }
}
