//! Graph normalization: topological sort and tree-shake.

use crate::module::{Module, Node};
use evoimg_core::{Error, Result};
use std::collections::VecDeque;
use tracing::trace;

impl Module {
    /// Sort + shake relative to the outputs.
    pub fn normalize(&mut self) -> Result<()> {
        self.topological_sort()?;
        self.tree_shake();
        Ok(())
    }

    /// Reorder nodes so that every argument index is larger than the index of
    /// the node using it.
    ///
    /// Nodes are ranked `1 + max(rank of arguments)` (0 for leaves) and stored
    /// by descending rank; ties keep their current relative order. Fails with
    /// [`Error::Cycle`], leaving the module untouched, if some node can never
    /// be ranked.
    pub fn topological_sort(&mut self) -> Result<()> {
        let ranks = self.ranks()?;
        let n = self.size();

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| ranks[b].cmp(&ranks[a]));

        let mut new_pos = vec![0usize; n];
        for (pos, &old) in order.iter().enumerate() {
            new_pos[old] = pos;
        }

        let mut slots: Vec<Option<Node>> = std::mem::take(&mut self.nodes)
            .into_iter()
            .map(Some)
            .collect();
        self.nodes = order
            .iter()
            .filter_map(|&old| slots[old].take())
            .map(|mut node| {
                for arg in &mut node.args {
                    *arg = new_pos[*arg];
                }
                node
            })
            .collect();

        for port in self.inputs.iter_mut().chain(self.outputs.iter_mut()) {
            port.index = port.index.map(|old| new_pos[old]);
        }
        trace!(module = %self.name, nodes = n, "topological sort");
        Ok(())
    }

    /// Work-list ranking. Arguments may be ranked after their users, so sweep
    /// until nothing changes.
    fn ranks(&self) -> Result<Vec<usize>> {
        let mut rank: Vec<Option<usize>> = vec![None; self.size()];
        let mut changed = true;
        while changed {
            changed = false;
            for (i, node) in self.nodes.iter().enumerate() {
                if rank[i].is_some() {
                    continue;
                }
                let mut max_child = Some(0);
                for &arg in &node.args {
                    match rank[arg] {
                        Some(r) => max_child = max_child.map(|m: usize| m.max(r + 1)),
                        None => {
                            max_child = None;
                            break;
                        }
                    }
                }
                if max_child.is_some() {
                    rank[i] = max_child;
                    changed = true;
                }
            }
        }

        let unranked = rank.iter().filter(|r| r.is_none()).count();
        if unranked > 0 {
            return Err(Error::Cycle {
                module: self.name.clone(),
                unranked,
            });
        }
        Ok(rank.into_iter().flatten().collect())
    }

    /// Dead-code elimination relative to the outputs.
    pub fn tree_shake(&mut self) {
        let roots = self.output_indices();
        self.tree_shake_from(&roots);
    }

    /// Keep only nodes reachable from `roots` through argument edges.
    ///
    /// Kept nodes are renumbered compactly in their current storage order, so
    /// a sorted module stays sorted. Ports whose node is dropped become
    /// unbound.
    pub fn tree_shake_from(&mut self, roots: &[usize]) {
        let n = self.size();
        if n == 0 {
            return;
        }

        let keep = self.reachable_from(roots);

        let mut new_index: Vec<Option<usize>> = vec![None; n];
        let mut next = 0;
        for i in (0..n).filter(|&i| keep[i]) {
            new_index[i] = Some(next);
            next += 1;
        }

        let nodes = std::mem::take(&mut self.nodes);
        self.nodes = nodes
            .into_iter()
            .enumerate()
            .filter(|(i, _)| keep[*i])
            .map(|(_, mut node)| {
                for arg in &mut node.args {
                    // reachable nodes only point at reachable nodes
                    *arg = new_index[*arg].unwrap_or(*arg);
                }
                node
            })
            .collect();

        for port in self.inputs.iter_mut().chain(self.outputs.iter_mut()) {
            port.index = port.index.and_then(|old| new_index[old]);
        }
        trace!(module = %self.name, before = n, after = next, "tree shake");
    }

    /// Breadth-first closure over argument edges. `marks[i]` is true for every
    /// node some root depends on, roots included.
    pub fn reachable_from(&self, roots: &[usize]) -> Vec<bool> {
        let mut marks = vec![false; self.size()];
        let mut queue: VecDeque<usize> = VecDeque::new();
        for &root in roots {
            if root < marks.len() && !marks[root] {
                marks[root] = true;
                queue.push_back(root);
            }
        }
        while let Some(i) = queue.pop_front() {
            for &arg in &self.nodes[i].args {
                if !marks[arg] {
                    marks[arg] = true;
                    queue.push_back(arg);
                }
            }
        }
        marks
    }

    /// Nodes that depend on `n`, directly or transitively, `n` included.
    pub fn dependents_of(&self, n: usize) -> Vec<bool> {
        let mut users: Vec<Vec<usize>> = vec![Vec::new(); self.size()];
        for (i, node) in self.nodes.iter().enumerate() {
            for &arg in &node.args {
                users[arg].push(i);
            }
        }

        let mut marks = vec![false; self.size()];
        if n >= marks.len() {
            return marks;
        }
        let mut queue = VecDeque::from([n]);
        marks[n] = true;
        while let Some(i) = queue.pop_front() {
            for &user in &users[i] {
                if !marks[user] {
                    marks[user] = true;
                    queue.push_back(user);
                }
            }
        }
        marks
    }

    /// True when every argument index is larger than its user's index.
    pub fn is_sorted(&self) -> bool {
        self.nodes
            .iter()
            .enumerate()
            .all(|(i, node)| node.args.iter().all(|&arg| arg > i))
    }
}

#[cfg(test)]
mod tests {
    use crate::module::{Module, Node};
    use crate::operator::{Operator, OperatorRegistry};
    use crate::parser::parse_module;
    use evoimg_core::Error;

    fn parse(s: &str) -> Module {
        parse_module(s, OperatorRegistry::standard())
            .unwrap_or_else(|e| panic!("cannot read '{}': {}", s, e))
    }

    #[test]
    fn test_topological_sort() {
        let cases = [
            ("(rgb)(xy)[rgb:  x|y ]", "(rgb)(xy)[rgb:x|y]"),
            ("(rbg)(xyr)[rgb:  + 1  2 | x| y | r]", "(rbg)(xyr)[rbg:+ 1 2|x|y|r]"),
            ("(rgb)(xy)[r:x|g:y|b:+ 0 1]", "(rgb)(xy)[b:+ 1 2|r:x|g:y]"),
            ("(bgr)(xyr)[r:+ 1 3 | g:x|  b: r| y]", "(bgr)(xyr)[r:+ 1 3|g:x|b:r|y]"),
            ("(bgr)(xyr)[r:+ 1 3|b:r|g:x|y]", "(bgr)(xyr)[r:+ 1 3|b:r|g:x|y]"),
            ("(ijk)(xy)[= 1|i:+ 2 3|jk:x|y]", "(ijk)(xy)[i:+ 2 3|= 1|jk:x|y]"),
            ("(abc)(xy)[= 0.2|+ 2 4|ab:x|= 0.3|c:y]", "(abc)(xy)[+ 2 4|= 0.2|ab:x|= 0.3|c:y]"),
            ("(rgb)(xy)[r:x|g:y|b:= 2]", "(rgb)(xy)[r:x|g:y|b:= 2]"),
            ("(uvw)(xy)[uv:x|= 5|w:y]", "(uvw)(xy)[uv:x|= 5|w:y]"),
            ("(rgb)()[rgb:= 1|= 2|= 3]", "(rgb)()[rgb:= 1|= 2|= 3]"),
            ("(rgb)(xy)[rgb:lerp 1 2 3|inv 2|x|band 4|y]", "(rgb)(xy)[rgb:lerp 1 3 2|inv 3|band 4|x|y]"),
            ("(rgb)(x)[rgb:* 1 2|x|inv 1]", "(rgb)(x)[rgb:* 2 1|inv 2|x]"),
        ];
        for (input, expected) in cases {
            let mut module = parse(input);
            module.topological_sort().unwrap();
            assert_eq!(module.to_string(), expected, "sorting '{}'", input);
            assert!(module.is_sorted());
        }
    }

    #[test]
    fn test_sort_and_tree_shake() {
        let cases = [
            ("(rgb)A1(xy)[rgb:  x|y ]", "(rgb)A1(xy)[rgb:x]"),
            ("(rbg)A2(xyr)[rgb:  + 1  2 | x| y | r]", "(rbg)A2(xyr)[rbg:+ 1 2|x|y]"),
            ("(bgr)pauek(xyr)[r:+ 1 3 | g:x|  b: r| y |bla]", "(bgr)pauek(xyr)[r:+ 1 3|g:x|b:r|y]"),
            ("(bgr)(xyr)[r:+ 1 3|b:r|g:x|y]", "(bgr)(xyr)[r:+ 1 3|b:r|g:x|y]"),
            ("(ijk)(xy)[i:+ 2 3|= 1|jk:x|y]", "(ijk)(xy)[i:+ 1 2|jk:x|y]"),
            ("(abc)(xy)[+ 2 4|= 0|ab:x|= 1|c:y]", "(abc)(xy)[ab:x|c:y]"),
            ("(abc)(xy)[a:+ 2 4|= 0.5|b:x|= 0.2|c:y]", "(abc)(xy)[a:+ 1 2|b:x|c:y]"),
            ("(rgb)(xy)[r:x|g:y|b:= 1]", "(rgb)(xy)[r:x|g:y|b:= 1]"),
            ("(rgb)(xy)[r:x|g:y|b:+ 0 1]", "(rgb)(xy)[b:+ 1 2|r:x|g:y]"),
            ("(uvw)(xyr)[uv:x|= 1|w:y]", "(uvw)(xyr)[uv:x|w:y]"),
            ("(rgb)(x)[rgb:= 1|= 2|= 3]", "(rgb)(x)[rgb:= 1]"),
            ("(rgb)(xy)[rgb:lerp 1 2 3|inv 2|x|band 4|y]", "(rgb)(xy)[rgb:lerp 1 3 2|inv 3|band 4|x|y]"),
            ("(rgb)(x)[rgb:* 1 2|x|inv 1]", "(rgb)(x)[rgb:* 2 1|inv 2|x]"),
            ("(p)(abc)[p:a|b|c]", "(p)(abc)[p:a]"),
            ("(p)(abc)[p:+ 2 1|b|c]", "(p)(abc)[p:+ 2 1|b|c]"),
        ];
        for (input, expected) in cases {
            let mut module = parse(input);
            module.normalize().unwrap();
            assert_eq!(module.to_string(), expected, "sorting + shaking '{}'", input);
        }
    }

    #[test]
    fn test_shake_unbinds_dropped_inputs() {
        let mut module = parse("(p)(abc)[p:a|b|c]");
        module.normalize().unwrap();
        assert_eq!(module.inputs[0].index, Some(0));
        assert_eq!(module.inputs[1].index, None);
        assert_eq!(module.inputs[2].index, None);
    }

    #[test]
    fn test_tree_shake_idempotent() {
        let mut module = parse("(rgb)(xyz)[r:lerp 3 4 5|g:inv 4|= 0.3|b:min 4 5|x|y|z|+ 5 6]");
        module.normalize().unwrap();
        let once = module.to_string();
        module.tree_shake();
        assert_eq!(module.to_string(), once);
    }

    #[test]
    fn test_shake_from_custom_roots() {
        let mut module = parse("(a)(xy)[a:+ 1 2|x|y]");
        module.tree_shake_from(&[2]);
        assert_eq!(module.size(), 1);
        assert_eq!(module.outputs[0].index, None);
        assert_eq!(module.inputs[1].index, Some(0));
    }

    #[test]
    fn test_cycle_detected() {
        let mut module = parse("(a)(x)[a:+ 1 2|inv 0|x]");
        let before = module.to_string();
        match module.topological_sort() {
            Err(Error::Cycle { unranked, .. }) => assert_eq!(unranked, 2),
            other => panic!("expected a cycle error, got {:?}", other),
        }
        assert_eq!(module.to_string(), before);
    }

    #[test]
    fn test_self_loop_detected() {
        let mut module = parse("(a)(x)[a:inv 0|x]");
        assert!(module.topological_sort().is_err());
    }

    #[test]
    fn test_reachability_and_dependents() {
        // 0 = + 1 2, 1 = inv 3, 2 = y, 3 = x
        let mut module = Module::new("", "xy", "a");
        module.nodes.push(Node::primitive(Operator::Add, vec![1, 2]));
        module.nodes.push(Node::primitive(Operator::Inv, vec![3]));
        module.nodes.push(Node::input('y'));
        module.nodes.push(Node::input('x'));
        module.outputs[0].index = Some(0);

        assert_eq!(module.reachable_from(&[1]), vec![false, true, false, true]);
        assert_eq!(module.reachable_from(&[0]), vec![true; 4]);
        assert_eq!(module.dependents_of(3), vec![true, true, false, true]);
        assert_eq!(module.dependents_of(2), vec![true, false, true, false]);
    }
}
