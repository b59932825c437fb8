mod crank;
mod rpc;
